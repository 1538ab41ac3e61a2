//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! `gplist <file>` dumps a plist or mobile-provision file as JSON;
//! `--cert` reports certificate summaries; `--has-udid <UDID>` checks
//! device authorization. Every failure exits 1 with a message on stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use gplist::json::{CertificateSummary, JsonDocument};
use gplist::MobileProvision;

#[derive(Parser, Debug)]
#[command(name = "gplist", about = "Read and inspect Apple property list documents")]
struct Args {
    /// Path to a plist, .ipa, .app directory, or mobile-provision file.
    file: PathBuf,

    /// Report DeveloperCertificates instead of the decoded document.
    #[arg(long)]
    cert: bool,

    /// Check whether a UDID is authorized by a mobile-provision file.
    #[arg(long = "has-udid", value_name = "UDID")]
    has_udid: Option<String>,
}

fn run(args: Args) -> gplist::Result<()> {
    if !args.file.is_file() && !args.file.is_dir() {
        return Err(gplist::Error::Io(format!("{} is not a valid file", args.file.display())));
    }

    let extension = args.file.extension().and_then(|e| e.to_str());
    if extension == Some("ipa") || args.file.is_dir() {
        if args.cert || args.has_udid.is_some() {
            return Err(gplist::Error::Io(format!(
                "{} is not recognized as a mobile provision file",
                args.file.display()
            )));
        }
        let document = gplist::app::decode_app_path(&args.file)?;
        let json = serde_json::to_string_pretty(&JsonDocument(&document))
            .map_err(|e| gplist::Error::Io(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    let bytes = std::fs::read(&args.file)?;

    match gplist::decode_auto(&bytes) {
        Ok(document) => {
            if args.cert || args.has_udid.is_some() {
                return Err(gplist::Error::Io(format!(
                    "{} is not recognized as a mobile provision file",
                    args.file.display()
                )));
            }
            let json = serde_json::to_string_pretty(&JsonDocument(&document))
                .map_err(|e| gplist::Error::Io(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
        Err(_) => {
            let provision = MobileProvision::from_bytes(&bytes)?;
            if args.cert {
                let summaries: Vec<CertificateSummary> =
                    provision.certificates()?.iter().map(CertificateSummary::from).collect();
                let json = serde_json::to_string_pretty(&summaries).map_err(|e| gplist::Error::Io(e.to_string()))?;
                println!("{}", json);
            } else if let Some(udid) = &args.has_udid {
                if provision.has_udid(udid)? {
                    println!("yes");
                } else {
                    println!("no");
                    return Err(gplist::Error::Io("udid not authorized".to_owned()));
                }
            } else {
                let json = serde_json::to_string_pretty(&JsonDocument(&provision.document))
                    .map_err(|e| gplist::Error::Io(e.to_string()))?;
                println!("{}", json);
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
