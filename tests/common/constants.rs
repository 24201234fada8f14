//! Shared constants for end-to-end tests

// ============================================================================
// Test Account Credentials
// ============================================================================

/// Account registered on every test identity provider
pub const TEST_EMAIL: &str = "tester@cloudmagnet.test";

/// Password of [`TEST_EMAIL`]
pub const TEST_PASS: &str = "testpass123";

// ============================================================================
// Magnet Links
// ============================================================================

/// 1000 bytes, named
pub const MAGNET_UBUNTU: &str =
    "magnet:?xt=urn:btih:3B245504CF5F11BBDBE1201CEA6A6BF45AEE1BC0&dn=ubuntu.iso&xl=1000";

/// 2000 bytes, named
pub const MAGNET_DEBIAN: &str =
    "magnet:?xt=urn:btih:A1B2C3D4E5F60718293A4B5C6D7E8F9012345678&dn=debian.iso&xl=2000";

/// No `xl`, the engine decides the size
pub const MAGNET_UNSIZED: &str = "magnet:?xt=urn:btih:DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF";

// ============================================================================
// Simulation knobs
// ============================================================================

/// Bytes the test engine moves per second
pub const ENGINE_SPEED: u64 = 500;

/// Quota of the test queue
pub const TEST_QUOTA: u64 = 1_000_000;
