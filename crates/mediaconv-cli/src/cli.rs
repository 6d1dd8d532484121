use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mediaconv_core::PipelineFormat;

#[derive(Parser, Debug)]
#[command(name = "mediaconv", about = "Operate the mediaconv gateway and job pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Gateway credentials
    Credentials {
        #[command(subcommand)]
        sub: CredentialCommands,
    },
    /// Bucket name checks
    Buckets {
        #[command(subcommand)]
        sub: BucketCommands,
    },
    /// Saved pipelines
    Pipelines {
        #[command(subcommand)]
        sub: PipelineCommands,
    },
    /// Conversion jobs
    Jobs {
        #[command(subcommand)]
        sub: JobCommands,
    },
    /// Print a presigned gateway URL for an object
    Presign {
        #[arg(long)]
        access_key: String,
        #[arg(long, value_enum, default_value_t = PresignMethod::Get)]
        method: PresignMethod,
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        expires: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum CredentialCommands {
    /// Issue a credential; the secret is printed only here
    Create {
        #[arg(long)]
        user: i64,
        /// Custom bucket name; generated when omitted
        #[arg(long)]
        bucket: Option<String>,
    },
    List {
        #[arg(long)]
        user: i64,
    },
    Revoke {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum BucketCommands {
    /// Report whether a bucket name is valid and free
    Check { name: String },
}

#[derive(Subcommand, Debug)]
pub enum PipelineCommands {
    /// Validate, compile and save a pipeline file
    Add {
        #[arg(long)]
        user: i64,
        /// Defaults to the name inside the file
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        file: PathBuf,
        /// yaml or json; guessed from the file extension when omitted
        #[arg(long)]
        format: Option<PipelineFormat>,
    },
    /// Validate and compile a pipeline file without saving it
    Validate {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        format: Option<PipelineFormat>,
    },
    List {
        #[arg(long)]
        user: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Show a job with its status history
    Show { id: i64 },
    Cancel {
        #[arg(long)]
        user: i64,
        id: i64,
    },
    /// Create a new pending job from a finished one
    Rerun {
        #[arg(long)]
        user: i64,
        id: i64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials_create() {
        let cli = Cli::try_parse_from([
            "mediaconv",
            "credentials",
            "create",
            "--user",
            "4",
            "--bucket",
            "my-media",
        ])
        .unwrap();
        match cli.command {
            Commands::Credentials {
                sub: CredentialCommands::Create { user, bucket },
            } => {
                assert_eq!(user, 4);
                assert_eq!(bucket.as_deref(), Some("my-media"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_pipeline_format() {
        let cli = Cli::try_parse_from([
            "mediaconv",
            "pipelines",
            "validate",
            "--file",
            "thumb.txt",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Pipelines {
                sub: PipelineCommands::Validate { format, .. },
            } => assert_eq!(format, Some(PipelineFormat::Json)),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from([
            "mediaconv",
            "pipelines",
            "validate",
            "--file",
            "thumb.txt",
            "--format",
            "toml",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_presign_defaults() {
        let cli = Cli::try_parse_from([
            "mediaconv",
            "presign",
            "--access-key",
            "AKIA",
            "--bucket",
            "b",
            "--key",
            "a.png",
        ])
        .unwrap();
        match cli.command {
            Commands::Presign {
                method, expires, ..
            } => {
                assert_eq!(method, PresignMethod::Get);
                assert_eq!(expires, 3600);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
