//! Schema provisioning command.

use credstore::{CredentialStore, StoreOptions};

use crate::backend::{backend_label, create_backend, flush, op_context};
use crate::cli::ConnectArgs;
use crate::output::OutputFormat;

/// Run the `provision` command
pub async fn run(args: &ConnectArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let backend = create_backend(args).await?;
    let options = StoreOptions::default()
        .provision_schema(true)
        .strict_bootstrap(true);
    let store = CredentialStore::open(backend, options, &op_context(args)).await?;
    flush(&store, args).await?;

    let label = backend_label(args);
    let users = store.len().await;
    match format {
        OutputFormat::Human => {
            println!("Provisioned users table on {label}");
            println!("Users:       {users}");
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "backend": label,
                "provisioned": true,
                "users": users,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
