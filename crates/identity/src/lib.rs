//! Device enrolment, token lifecycle, and DeviceCheck attestation (C7, §4.7).

#![warn(clippy::all)]

pub mod devicecheck;
pub mod error;
pub mod token_service;

pub use devicecheck::{DeviceCheckClient, DeviceCheckConfig, DeviceCheckError};
pub use error::{IdentityError, Result};
pub use token_service::{EnrolRequest, EnrolResponse, TokenService};
