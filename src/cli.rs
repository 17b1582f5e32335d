use anyhow::Result;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CliCommand {
    Scan,
    Watch { interval: Option<u64> },
    Devices,
    Alerts,
    Health,
    Rename { mac: String, name: String },
    Help,
    Version,
}

pub(crate) fn version_text() -> String {
    format!("netview {}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn usage_text() -> String {
    format!(
        "{version}
NetView Core Engine — Subnet Discovery & Device Registry CLI

Usage:
  netview [scan]
  netview watch [--interval <SECS>]
  netview devices
  netview alerts
  netview health
  netview rename --mac <MAC> --name <NAME>
  netview --help
  netview --version

Options:
      --interval <SECS>  Watch: seconds between reconciliation cycles
                         (default: NETVIEW_SCAN_INTERVAL_SECS or 30)
      --mac <MAC>        Rename: device MAC address (any common separator)
      --name <NAME>      Rename: user label; an empty value clears it
  -h, --help             Show this help text
  -V, --version          Show version",
        version = version_text()
    )
}

fn parse_u64_arg(flag: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().ok().filter(|v| *v > 0).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid value for {}: '{}'. Expected a positive integer.\n\n{}",
            flag,
            raw,
            usage_text()
        )
    })
}

pub(crate) fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut interval: Option<u64> = None;
    let mut mac: Option<String> = None;
    let mut name: Option<String> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "scan" | "watch" | "devices" | "alerts" | "health" | "rename" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(anyhow::anyhow!(
                        "Multiple commands provided. Use only one command.\n\n{}",
                        usage_text()
                    ));
                }
                command = Some(arg.to_string());
            }
            "--interval" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --interval.\n\n{}", usage_text())
                })?;
                interval = Some(parse_u64_arg("--interval", value.as_ref())?);
            }
            "--mac" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --mac.\n\n{}", usage_text())
                })?;
                mac = Some(value.as_ref().to_string());
            }
            "--name" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --name.\n\n{}", usage_text())
                })?;
                name = Some(value.as_ref().to_string());
            }
            _ if arg.starts_with("--interval=") => {
                let value = &arg["--interval=".len()..];
                interval = Some(parse_u64_arg("--interval", value)?);
            }
            _ if arg.starts_with("--mac=") => {
                mac = Some(arg["--mac=".len()..].to_string());
            }
            _ if arg.starts_with("--name=") => {
                name = Some(arg["--name=".len()..].to_string());
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "Unknown argument: '{}'.\n\n{}",
                    arg,
                    usage_text()
                ));
            }
        }
    }

    match command.as_deref() {
        None | Some("scan") => Ok(CliCommand::Scan),
        Some("watch") => Ok(CliCommand::Watch { interval }),
        Some("devices") => Ok(CliCommand::Devices),
        Some("alerts") => Ok(CliCommand::Alerts),
        Some("health") => Ok(CliCommand::Health),
        Some("rename") => {
            let mac = mac.ok_or_else(|| {
                anyhow::anyhow!("rename requires --mac <MAC>.\n\n{}", usage_text())
            })?;
            let name = name.ok_or_else(|| {
                anyhow::anyhow!("rename requires --name <NAME>.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Rename { mac, name })
        }
        Some(other) => Err(anyhow::anyhow!(
            "Unknown command: '{}'.\n\n{}",
            other,
            usage_text()
        )),
    }
}
