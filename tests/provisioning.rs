//! End-to-end provisioning against a loopback HTTP responder.

use serverauth_agent::core::config::ServerConfig;
use serverauth_agent::core::error::{ProvisionError, SubmitError};
use serverauth_agent::core::identity::StaticResolver;
use serverauth_agent::core::paths::AgentPaths;
use serverauth_agent::core::registry::AccountRegistry;
use serverauth_agent::core::remote::ApiClient;
use serverauth_agent::core::workflow::Provisioner;
use serverauth_agent::models::agent_config::AgentFile;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

const BLOB: &str = "# START ServerAuth Managed Keys File\nssh-ed25519 AAAAC3Nz alice@laptop\n# END ServerAuth Managed Keys File\n";

/// A captured request: head (request line and headers) plus body.
struct Captured {
    head: String,
    body: String,
}

/// Serve one canned response per connection, in order, then stop.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            captured.push(read_request(&mut stream));
            let reply = format!(
                "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
        }
        captured
    });
    (base, handle)
}

fn read_request(stream: &mut impl Read) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Captured {
        head,
        body: String::from_utf8_lossy(&buf[head_end..]).to_string(),
    }
}

fn config(base: &str) -> ServerConfig {
    let file = AgentFile {
        orgid: Some("42".into()),
        apikey: Some("srvkey".into()),
        teamkey: Some("teamkey".into()),
        basedomain: Some(base.to_string()),
        ..AgentFile::default()
    };
    ServerConfig::resolve_with(&file, |_| None).unwrap()
}

struct Host {
    _root: TempDir,
    home: TempDir,
    paths: AgentPaths,
    resolver: StaticResolver,
}

fn host() -> Host {
    let root = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    let paths = AgentPaths::from_root(root.path().to_path_buf());
    let resolver = StaticResolver::new().with_user(
        "alice",
        nix::unistd::getuid().as_raw(),
        nix::unistd::getgid().as_raw(),
        home.path().to_path_buf(),
    );
    Host {
        _root: root,
        home,
        paths,
        resolver,
    }
}

#[test]
fn add_then_sync_installs_remote_keys() {
    let (base, server) = serve(vec![(200, BLOB)]);
    let host = host();
    let keys = host.home.path().join(".ssh/authorized_keys");
    fs::create_dir_all(keys.parent().unwrap()).unwrap();
    fs::write(&keys, "ssh-rsa AAAA operator-key\n").unwrap();

    let provisioner = Provisioner::new(config(&base), host.resolver.clone(), ApiClient::new().unwrap())
        .with_lock_dir(host.paths.lock_dir.clone());

    let mut registry = AccountRegistry::open_locked(&host.paths).unwrap();
    let added = provisioner.add(&mut registry, "alice", "acctkey").unwrap();
    drop(registry);
    let backup = added.backup.expect("existing keys backed up");
    assert_eq!(fs::read_to_string(backup).unwrap(), "ssh-rsa AAAA operator-key\n");

    let registry = AccountRegistry::load(&host.paths.config_toml).unwrap();
    let report = provisioner.sync(&registry);
    assert!(report.is_success(), "{:?}", report);
    assert_eq!(fs::read_to_string(&keys).unwrap(), BLOB);
    assert_eq!(
        fs::metadata(&keys).unwrap().permissions().mode() & 0o777,
        0o600
    );

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].head.starts_with("GET /keys/42/srvkey/acctkey HTTP/1.1"));
    let head = requests[0].head.to_ascii_lowercase();
    assert!(head.contains(&format!(
        "user-agent: serverauthagent-v2.0.0;{}",
        std::env::consts::OS
    )));
}

#[test]
fn sync_error_status_leaves_file_alone() {
    let (base, server) = serve(vec![(500, "<html>oops</html>")]);
    let host = host();
    let provisioner = Provisioner::new(config(&base), host.resolver.clone(), ApiClient::new().unwrap());

    let mut registry = AccountRegistry::open_locked(&host.paths).unwrap();
    provisioner.add(&mut registry, "alice", "acctkey").unwrap();
    let keys = host.home.path().join(".ssh/authorized_keys");
    let before = fs::read_to_string(&keys).unwrap();

    let report = provisioner.sync(&registry);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.outcomes[0].result,
        Err(ProvisionError::RemoteFetch { .. })
    ));
    assert_eq!(fs::read_to_string(&keys).unwrap(), before);
    server.join().unwrap();
}

#[test]
fn sync_html_body_with_ok_status_fails_validation() {
    let (base, server) = serve(vec![(200, "<html>maintenance</html>")]);
    let host = host();
    let provisioner = Provisioner::new(config(&base), host.resolver.clone(), ApiClient::new().unwrap());

    let mut registry = AccountRegistry::open_locked(&host.paths).unwrap();
    provisioner.add(&mut registry, "alice", "acctkey").unwrap();

    let report = provisioner.sync(&registry);
    assert!(matches!(
        report.outcomes[0].result,
        Err(ProvisionError::Validation(_))
    ));
    server.join().unwrap();
}

#[test]
fn submit_metrics_posts_form_with_api_key_headers() {
    let (base, server) = serve(vec![(200, "")]);
    let client = ApiClient::new().unwrap();
    let form = vec![
        ("mem[total]".to_string(), "1024".to_string()),
        ("time[zone]".to_string(), "+00:00".to_string()),
    ];
    client
        .submit_metrics(&base, "teamkey", "srvkey", &form)
        .unwrap();

    let requests = server.join().unwrap();
    let head = requests[0].head.to_ascii_lowercase();
    assert!(requests[0].head.starts_with("POST /monitoring HTTP/1.1"));
    assert!(head.contains("teamapikey: teamkey"));
    assert!(head.contains("serverapikey: srvkey"));
    assert!(head.contains("content-type: application/x-www-form-urlencoded"));
    assert_eq!(
        requests[0].body,
        "mem%5Btotal%5D=1024&time%5Bzone%5D=%2B00%3A00"
    );
}

#[test]
fn submit_metrics_reports_error_status() {
    let (base, server) = serve(vec![(401, "")]);
    let client = ApiClient::new().unwrap();
    let err = client
        .submit_metrics(&base, "teamkey", "srvkey", &[])
        .unwrap_err();
    assert!(matches!(err, SubmitError::Status(s) if s.as_u16() == 401));
    server.join().unwrap();
}
