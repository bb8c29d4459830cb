//! Ramp controllers
//!
//! Both ramps are implemented as methods on [`Runner`](crate::Runner):
//! [`run_user_load`](crate::Runner::run_user_load) steps the number of concurrent virtual users,
//! [`run_data_load`](crate::Runner::run_data_load) steps the simulated data volume.
mod data_load;
mod user_load;
