//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the ServoLink device:
//! command validation and dispatch, the deferred restore protocol, and the
//! autonomous sweep.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
