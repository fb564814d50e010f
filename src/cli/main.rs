use appconnect::{AuthenticationInfo, Connection, Connector, ConnectorError, Event};

use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, Command};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use url::Url;

fn start() -> Result<(), ConnectorError> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("connect_url")
                .value_name("CONNECT_URL")
                .required(true)
                .help("One-time connect URL handed out by the platform"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Verbose output"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .action(ArgAction::SetTrue)
                .help("Prints debugging information"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .required(true)
                .help("Password protecting the issued trust material"),
        )
        .arg(
            Arg::new("new_password")
                .long("new-password")
                .value_name("PASSWORD")
                .help("Renew the certificate after pairing, protecting it with this password"),
        )
        .arg(
            Arg::new("metadata")
                .long("metadata")
                .value_name("FILE")
                .help("Register the metadata document from FILE"),
        )
        .arg(
            Arg::new("basic_auth")
                .long("basic-auth")
                .value_name("USER:PASSWORD")
                .conflicts_with("oauth")
                .help("Inject basic-auth credentials into the metadata document"),
        )
        .arg(
            Arg::new("oauth")
                .long("oauth")
                .value_name("URL,CLIENT_ID,CLIENT_SECRET")
                .help("Inject OAuth2 client-credentials into the metadata document"),
        )
        .arg(
            Arg::new("event")
                .long("event")
                .action(ArgAction::SetTrue)
                .help("Publish a sample event after pairing"),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let debug = matches.get_flag("debug");

    env_logger::builder()
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else if verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let connect_url = matches
        .get_one::<String>("connect_url")
        .map(|s| s.as_str())
        .ok_or(ConnectorError::UsageError("Missing connect URL"))?;
    let connect_url = Url::parse(connect_url)
        .map_err(|_| ConnectorError::UsageError("Connect URL is not a valid URL"))?;
    let password = matches
        .get_one::<String>("password")
        .map(|s| s.as_str())
        .ok_or(ConnectorError::UsageError("Missing password"))?;

    let authentication = parse_authentication(&matches)?;

    let connector = Connector::new();

    let mut connection = connector.pair(&connect_url, password)?;
    println!(
        "Successfully paired with application [{}]",
        connection.application_name()
    );
    print_certificate(&connection);

    connection = connector.get_info(&connection)?;
    println!("Successfully refreshed connection info");

    if let Some(new_password) = matches.get_one::<String>("new_password") {
        connection = connector.renew(&connection, new_password)?;
        println!("Successfully renewed certificate");
        print_certificate(&connection);
    }

    if let Some(path) = matches.get_one::<String>("metadata") {
        let raw = std::fs::read(path)
            .map_err(|e| ConnectorError::MetadataDocumentInvalid(format!("{path}: {e}")))?;
        let document = serde_json::from_slice(&raw)
            .map_err(|e| ConnectorError::MetadataDocumentInvalid(format!("{path}: {e}")))?;
        connector.register_metadata(&connection, document, authentication.as_ref())?;
        println!("Successfully registered metadata from [{path}]");
    }

    if matches.get_flag("event") {
        let event_time = time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|_| ConnectorError::UsageError("Cannot format event timestamp"))?;
        let event = Event::new(
            "person.created",
            "v1",
            event_time,
            json!({ "personid": "testperson" }),
        );
        connector.publish_event(&connection, &event)?;
        println!("Successfully published person.created event");
    }

    Ok(())
}

fn print_certificate(connection: &Connection) {
    if let Ok(expires) = connection.certificate_expires_at() {
        match expires.format(&Rfc3339) {
            Ok(formatted) => println!("Certificate expires [{formatted}]"),
            Err(_) => println!("Certificate expires [{expires}]"),
        }
    }
    println!(
        "Certificate fingerprint [{}]",
        connection.certificate_fingerprint()
    );
}

fn parse_authentication(
    matches: &clap::ArgMatches,
) -> Result<Option<AuthenticationInfo>, ConnectorError> {
    if let Some(spec) = matches.get_one::<String>("basic_auth") {
        let (username, password) = spec.split_once(':').ok_or(ConnectorError::UsageError(
            "Basic auth must be given as USER:PASSWORD",
        ))?;
        return Ok(Some(AuthenticationInfo::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }));
    }

    if let Some(spec) = matches.get_one::<String>("oauth") {
        let mut parts = spec.splitn(3, ',');
        let (Some(url), Some(client_id), Some(client_secret)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ConnectorError::UsageError(
                "OAuth credentials must be given as URL,CLIENT_ID,CLIENT_SECRET",
            ));
        };
        let url = Url::parse(url)
            .map_err(|_| ConnectorError::UsageError("OAuth token URL is not a valid URL"))?;
        return Ok(Some(AuthenticationInfo::OAuth2ClientCredentials {
            url,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }));
    }

    Ok(None)
}

fn main() {
    if let Err(e) = start() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
