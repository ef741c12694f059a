/*! Integration tests for credstore.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * - store: CredentialStore operations, bootstrap and write-through
 * - backend: durable backends through the UserBackend trait
 * - flows: register, confirm, recover, remember and lockout steps
 * - concurrency: parallel creates, saves and token use on one store
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("credstore=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod backend;
mod store;
