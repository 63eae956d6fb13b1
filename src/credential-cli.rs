//! A simple CLI tool for issuing voter credentials.
//!
//! This runs offline, outside the request path: it holds the issuer key
//! material and writes signed credential tokens for voters to carry. The
//! tokens it produces verify against the library's own implementation, and
//! are therefore by definition compatible with the server.

use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command};

use didvote_backend::credential::{CredentialError, CredentialSubject, IssuerKey, DEFAULT_KEY_PATH};
use didvote_backend::identity::Did;
use didvote_backend::model::db::voter::RegistrationDetails;

const PROGRAM_NAME: &str = "credential-cli";

const ABOUT_TEXT: &str = "Issue verifiable voter credentials.

Generating the issuer key is a one-time, irreversible step: the issuer DID
is derived from the key, so replacing it orphans every outstanding
credential.

EXIT CODES:
     0: Success.
 Other: Error.";

const KEY_PATH: &str = "KEY_PATH";
const KEY_PATH_HELP: &str = "The path of the issuer key file";

const OUT_DIR: &str = "OUT_DIR";
const OUT_DIR_HELP: &str = "The directory to write issued credentials into";

const GENERATE_KEY: &str = "generate-key";
const ISSUE: &str = "issue";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let key_path = Arg::new(KEY_PATH)
        .long("key-file")
        .help(KEY_PATH_HELP)
        .action(ArgAction::Set)
        .default_value(DEFAULT_KEY_PATH);

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .subcommand(
            Command::new(GENERATE_KEY)
                .about("Generate the issuer key material")
                .arg(key_path.clone()),
        )
        .subcommand(
            Command::new(ISSUE)
                .about("Interactively issue a credential for one voter")
                .arg(key_path)
                .arg(
                    Arg::new(OUT_DIR)
                        .long("out-dir")
                        .help(OUT_DIR_HELP)
                        .action(ArgAction::Set)
                        .default_value("credentials"),
                ),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// The issuer key already exists and must not be overwritten.
    KeyExists(String),
    /// The voter attributes were rejected.
    Attributes(String),
    /// Credential issuance failed for the contained reason.
    Credential(CredentialError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IO(msg) => write!(f, "IO error: {msg}"),
            Error::KeyExists(path) => write!(
                f,
                "Refusing to overwrite existing issuer key at '{path}'; \
                 replacing it would orphan every outstanding credential"
            ),
            Error::Attributes(msg) => write!(f, "Invalid voter attributes: {msg}"),
            Error::Credential(err) => write!(f, "{err}"),
        }
    }
}

impl From<CredentialError> for Error {
    fn from(err: CredentialError) -> Self {
        Error::Credential(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

/// Ask one question on the terminal and read the answer.
fn prompt(question: &str) -> Result<String, Error> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Generate and store fresh issuer key material.
fn generate_key(key_path: &Path) -> Result<(), Error> {
    if key_path.exists() {
        return Err(Error::KeyExists(key_path.display().to_string()));
    }
    let issuer = IssuerKey::generate()?;
    issuer.save(key_path)?;
    println!("Issuer DID: {}", issuer.did);
    println!("Key material saved to '{}'", key_path.display());
    Ok(())
}

/// Interactively issue one credential.
fn issue(key_path: &Path, out_dir: &Path) -> Result<(), Error> {
    let issuer = IssuerKey::load(key_path)?;

    let details = RegistrationDetails {
        voter_id: prompt("Voter ID: ")?,
        full_name: prompt("Full name: ")?,
        relation_name: prompt("Father's/Mother's/Husband's name: ")?,
        date_of_birth: prompt("Date of birth (dd/mm/yyyy): ")?,
        gender: prompt("Gender: ")?,
        address: prompt("Residential address: ")?,
    };
    details
        .validate()
        .map_err(|err| Error::Attributes(err.to_string()))?;

    // Use the voter's registered DID when known; otherwise derive a
    // placeholder subject from the voter ID.
    let subject_did = prompt("Subject DID (leave blank to derive from the voter ID): ")?;
    let subject_did: Did = if subject_did.is_empty() {
        format!("did:example:{}", details.voter_id)
            .parse()
            .map_err(CredentialError::from)?
    } else {
        subject_did.parse().map_err(CredentialError::from)?
    };

    let voter_id = details.voter_id.clone();
    let subject = CredentialSubject::new(subject_did, details);
    let token = issuer.issue(subject, Utc::now())?;

    fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join(format!("{voter_id}.jwt"));
    fs::write(&out_path, token)?;
    println!("Signed credential saved to '{}'", out_path.display());
    Ok(())
}

/// Run the requested subcommand and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let result = match args.subcommand() {
        Some((GENERATE_KEY, sub_args)) => {
            let key_path: &String = sub_args.get_one(KEY_PATH).unwrap(); // Defaulted argument is always present.
            generate_key(Path::new(key_path))
        }
        Some((ISSUE, sub_args)) => {
            let key_path: &String = sub_args.get_one(KEY_PATH).unwrap();
            let out_dir: &String = sub_args.get_one(OUT_DIR).unwrap();
            issue(Path::new(key_path), &PathBuf::from(out_dir))
        }
        _ => unreachable!("subcommand is required"),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            println!("{err}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into());
}
