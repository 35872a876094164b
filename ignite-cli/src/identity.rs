use ignite::topology::LocalIdentity;
use tokio::process::Command;

/// Works out the names and addresses this machine answers to.
///
/// The short and fully qualified hostnames are both collected, alongside every
/// address assigned to the machine. A `node_name` override replaces the
/// detected hostnames entirely.
pub async fn detect(node_name: Option<&str>) -> LocalIdentity {
    let addresses = hostname(&["-I"]).await.unwrap_or_default();
    let addresses = addresses.split_whitespace().collect::<Vec<_>>();

    if let Some(node_name) = node_name {
        return LocalIdentity::new([node_name], addresses);
    }

    let mut hostnames = Vec::new();
    for args in [&[][..], &["-f"][..]] {
        if let Some(name) = hostname(args).await {
            hostnames.push(name);
        }
    }

    LocalIdentity::new(hostnames, addresses)
}

async fn hostname(args: &[&str]) -> Option<String> {
    let output = match Command::new("hostname").args(args).output().await {
        Ok(output) => output,
        Err(e) => {
            warn!(args = ?args, error = ?e, "Failed to run hostname.");
            return None;
        },
    };

    if !output.status.success() {
        debug!(args = ?args, status = ?output.status, "hostname exited unsuccessfully.");
        return None;
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}
