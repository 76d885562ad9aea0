//! Placeholder library target so Cargo has something to build; all the
//! actual coverage lives under `tests/` as end-to-end scenario tests
//! exercising the crate boundary the way a real client would.
