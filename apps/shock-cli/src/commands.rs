use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use shock_client::{Attributes, ShockClient};
use tracing::info;

use crate::Command;
use crate::config::Config;

pub fn run(config: &Config, command: Command) -> anyhow::Result<()> {
    let client = ShockClient::connect(config.client_config())
        .with_context(|| format!("connecting to {}", config.url))?;

    match command {
        Command::Version => {
            println!("{} {}", client.url(), client.shock_version());
        }
        Command::Upload {
            path,
            format,
            attributes,
            name,
        } => {
            let attributes = attributes.as_deref().map(parse_attributes).transpose()?;
            let filename = match name {
                Some(name) => name,
                None => default_filename(&path)?,
            };
            let source: Box<dyn Read> = if path.as_os_str() == "-" {
                Box::new(io::stdin().lock())
            } else {
                Box::new(File::open(&path).with_context(|| format!("opening {}", path.display()))?)
            };
            let node = client.add_node_with_file(
                attributes.as_ref(),
                source,
                &filename,
                format.as_deref(),
            )?;
            print_json(node.record()?)?;
        }
        Command::Download { id, out } => {
            let bytes = if out.as_os_str() == "-" {
                let mut stdout = io::stdout().lock();
                let n = client.write_file_by_id(&id, &mut stdout)?;
                stdout.flush()?;
                n
            } else {
                let file =
                    File::create(&out).with_context(|| format!("creating {}", out.display()))?;
                let mut sink = BufWriter::new(file);
                let n = client.write_file_by_id(&id, &mut sink)?;
                sink.flush()?;
                n
            };
            info!(node = %id, bytes, "download complete");
        }
        Command::Info { id } => {
            let node = client.get_node(&id)?;
            print_json(node.record()?)?;
        }
        Command::Delete { id } => {
            client.delete_node(&id)?;
            info!(node = %id, "deleted");
        }
        Command::Acl { id, acl } => {
            let acls = match acl {
                Some(acl) => client.get_acls_of_type(&id, acl)?,
                None => client.get_acls(&id)?,
            };
            print_json(&acls)?;
        }
        Command::Share { id, acl, users } => {
            print_json(&client.add_to_node_acl(&id, users.as_slice(), acl)?)?;
        }
        Command::Unshare { id, acl, users } => {
            print_json(&client.remove_from_node_acl(&id, users.as_slice(), acl)?)?;
        }
        Command::Public { id, revoke } => {
            print_json(&client.set_publicly_readable(&id, !revoke)?)?;
        }
    }
    Ok(())
}

fn parse_attributes(raw: &str) -> anyhow::Result<Attributes> {
    serde_json::from_str(raw).context("--attributes must be a JSON object")
}

fn default_filename(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .filter(|n| n != "-")
        .context("cannot derive a filename from the path; pass --name")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
