use anyhow::{bail, Context};
use perfgate::core::Task;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Deserialize, Debug)]
struct Endpoint {
    url: String,
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<String>,
}

impl From<Endpoint> for Task {
    fn from(endpoint: Endpoint) -> Self {
        Task {
            method: endpoint.method.to_uppercase(),
            url: endpoint.url,
            headers: endpoint.headers,
            body: endpoint
                .body
                .filter(|body| !body.is_empty())
                .map(String::into_bytes),
        }
    }
}

/// Read the endpoint file, a JSON array of `{url, method, headers?, body?}`.
pub fn load(path: &Path) -> anyhow::Result<Vec<Task>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read endpoint file {}", path.display()))?;
    parse(&data).with_context(|| format!("Invalid endpoint file {}", path.display()))
}

fn parse(data: &str) -> anyhow::Result<Vec<Task>> {
    let endpoints: Vec<Endpoint> = serde_json::from_str(data)?;
    if endpoints.is_empty() {
        bail!("No endpoints defined");
    }
    Ok(endpoints.into_iter().map(Task::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoints() {
        let tasks = parse(
            r#"[
                {"url": "http://localhost:8080/users", "method": "get"},
                {
                    "url": "http://localhost:8080/users",
                    "method": "POST",
                    "headers": {"Content-Type": "application/json"},
                    "body": "{\"name\":\"a\"}"
                },
                {"url": "http://localhost:8080/empty", "method": "PUT", "body": ""}
            ]"#,
        )
        .unwrap();

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0], Task::new("GET", "http://localhost:8080/users"));
        assert_eq!(
            tasks[1],
            Task::new("POST", "http://localhost:8080/users")
                .header("Content-Type", "application/json")
                .body(r#"{"name":"a"}"#)
        );
        assert_eq!(tasks[2].body, None);
    }

    #[test]
    fn rejects_empty_list() {
        let err = parse("[]").unwrap_err();
        assert_eq!(err.to_string(), "No endpoints defined");
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(parse(r#"[{"url": "http://localhost"}]"#).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load(Path::new("does-not-exist.json")).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.json"));
    }
}
