//! Integration tests: integrity monitor lifecycle, database battery ordering,
//! store concurrency, capture heuristics on crafted frames, config defaults.

use hostwatch::config::AgentConfig;
use hostwatch::detectors::heuristics;
use hostwatch::detectors::{
    evaluate_mysql, evaluate_postgres, inspect_arp_reply, inspect_dns, inspect_ipv4_source,
    inspect_mac_source, parse_lastlog, AuditError, Detector, FileIntegrityMonitor,
    IntegrityDetector, MysqlSettings, PostgresSettings,
};
use hostwatch::store::{AuditKind, SecurityStore, Violation, ViolationKind, Vulnerability};
use std::path::Path;
use std::sync::Arc;

fn write_file(path: &Path, contents: &[u8]) {
    std::fs::write(path, contents).unwrap();
}

#[test]
fn config_load_default() {
    let c = AgentConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.network.interface, "eth0");
    assert_eq!(c.network.ddos_packet_rate, 100_000);
    assert_eq!(c.network.dns_filter, "udp port 53");
    assert_eq!(c.poll_interval_secs, 120);
    assert!(!c.collector.enabled);
    assert!(!c.integrity.persist_baseline);
}

#[test]
fn credential_debug_redacts_secret() {
    let cred = hostwatch::config::Credential {
        username: "scott".into(),
        secret: "tiger".into(),
    };
    let debug = format!("{cred:?}");
    assert!(debug.contains("scott"));
    assert!(!debug.contains("tiger"));
}

// ---- file integrity ----

#[test]
fn first_observation_is_never_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.conf"), b"initial contents");
    let store = SecurityStore::new();
    let mut monitor = FileIntegrityMonitor::new(dir.path());
    let changed = monitor.scan(&store).unwrap();
    assert!(!changed);
    assert!(store.violations().is_empty());
    assert_eq!(monitor.tracked_paths(), 1);
}

#[test]
fn unchanged_rescan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.conf"), b"stable");
    write_file(&dir.path().join("b.conf"), b"also stable");
    let store = SecurityStore::new();
    let mut monitor = FileIntegrityMonitor::new(dir.path());
    monitor.scan(&store).unwrap();
    let changed = monitor.scan(&store).unwrap();
    assert!(!changed);
    assert!(store.violations().is_empty());
}

#[test]
fn single_byte_change_yields_exactly_one_violation() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("watched.bin");
    write_file(&target, b"aaaa");
    let store = SecurityStore::new();
    let mut monitor = FileIntegrityMonitor::new(dir.path());
    monitor.scan(&store).unwrap();

    write_file(&target, b"aaab");
    let changed = monitor.scan(&store).unwrap();
    assert!(changed);

    let violations = store.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Integrity);
    assert_eq!(violations[0].subject, target.to_string_lossy());

    // The stored digest now matches the new contents.
    let expected = FileIntegrityMonitor::hash_file(&target).unwrap();
    assert_eq!(monitor.digest(&target), Some(expected));
}

#[test]
fn directories_are_never_hashed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();
    write_file(&dir.path().join("subdir").join("f"), b"x");
    let store = SecurityStore::new();
    let mut monitor = FileIntegrityMonitor::new(dir.path());
    monitor.scan(&store).unwrap();
    assert_eq!(monitor.tracked_paths(), 1);
}

#[test]
fn per_cycle_reset_never_compares_across_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("watched.bin");
    write_file(&target, b"cycle one");
    let store = SecurityStore::new();
    let mut detector = IntegrityDetector::new(dir.path(), false);
    detector.run(&store).unwrap();

    write_file(&target, b"cycle two");
    detector.run(&store).unwrap();
    // History resets every cycle, so the cross-cycle change is invisible.
    assert!(store.violations().is_empty());
}

#[test]
fn persistent_baseline_detects_cross_cycle_change() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("watched.bin");
    write_file(&target, b"cycle one");
    let store = SecurityStore::new();
    let mut detector = IntegrityDetector::new(dir.path(), true);
    detector.run(&store).unwrap();

    write_file(&target, b"cycle two");
    detector.run(&store).unwrap();
    let violations = store.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].subject, target.to_string_lossy());
}

#[test]
fn walk_error_fails_loud() {
    let store = SecurityStore::new();
    let mut detector = IntegrityDetector::new("/nonexistent/hostwatch-test-root", false);
    assert!(detector.run(&store).is_err());
}

// ---- database battery ----

fn secure_postgres() -> PostgresSettings {
    PostgresSettings {
        auth_method: "scram-sha-256".into(),
        ssl: true,
        encryption_configured: true,
        listen_addresses: "localhost".into(),
        max_connections: 100,
        superuser_reserved_connections: 3,
    }
}

#[test]
fn postgres_secure_settings_pass() {
    assert!(evaluate_postgres(&secure_postgres()).is_ok());
}

#[test]
fn postgres_trust_auth_reports_access_control_and_stops() {
    // Everything after the first diagnostic is also misconfigured; only the
    // first failure may be reported.
    let settings = PostgresSettings {
        auth_method: "trust".into(),
        ssl: false,
        encryption_configured: false,
        listen_addresses: "*".into(),
        max_connections: 1000,
        superuser_reserved_connections: 10,
    };
    match evaluate_postgres(&settings) {
        Err(AuditError::AccessControl(_)) => {}
        other => panic!("expected AccessControl, got {other:?}"),
    }
}

#[test]
fn postgres_md5_auth_is_accepted() {
    let mut settings = secure_postgres();
    settings.auth_method = "md5".into();
    assert!(evaluate_postgres(&settings).is_ok());
}

#[test]
fn postgres_tls_checked_second() {
    let mut settings = secure_postgres();
    settings.ssl = false;
    settings.encryption_configured = false;
    match evaluate_postgres(&settings) {
        Err(AuditError::Tls(_)) => {}
        other => panic!("expected Tls, got {other:?}"),
    }
}

#[test]
fn postgres_encryption_checked_third() {
    let mut settings = secure_postgres();
    settings.encryption_configured = false;
    match evaluate_postgres(&settings) {
        Err(AuditError::Encryption(_)) => {}
        other => panic!("expected Encryption, got {other:?}"),
    }
}

#[test]
fn postgres_exposure_thresholds() {
    // max_connections over the limit with a wildcard listen address, all
    // earlier diagnostics passing.
    let mut settings = secure_postgres();
    settings.listen_addresses = "*".into();
    settings.max_connections = 150;
    match evaluate_postgres(&settings) {
        Err(AuditError::NetworkExposure(_)) => {}
        other => panic!("expected NetworkExposure, got {other:?}"),
    }

    // Any single violated clause is enough.
    let mut settings = secure_postgres();
    settings.superuser_reserved_connections = 4;
    assert!(matches!(
        evaluate_postgres(&settings),
        Err(AuditError::NetworkExposure(_))
    ));
}

#[test]
fn mysql_tls_checked_before_exposure() {
    let settings = MysqlSettings {
        have_ssl: "NO".into(),
        bind_address: "0.0.0.0".into(),
        max_connections: 1000,
    };
    match evaluate_mysql(&settings) {
        Err(AuditError::Tls(_)) => {}
        other => panic!("expected Tls, got {other:?}"),
    }
}

#[test]
fn mysql_exposure_and_pass() {
    let exposed = MysqlSettings {
        have_ssl: "YES".into(),
        bind_address: "0.0.0.0".into(),
        max_connections: 100,
    };
    assert!(matches!(
        evaluate_mysql(&exposed),
        Err(AuditError::NetworkExposure(_))
    ));

    let secure = MysqlSettings {
        have_ssl: "YES".into(),
        bind_address: "127.0.0.1".into(),
        max_connections: 100,
    };
    assert!(evaluate_mysql(&secure).is_ok());
}

// ---- store ----

#[test]
fn counters_are_monotonic_across_cycles() {
    let store = SecurityStore::new();
    let n = 5;
    for _ in 0..n {
        store.record(Violation::new(ViolationKind::Ddos, "eth0", "rate exceeded"));
    }
    let counter = store.metrics.ddos_attacks.with_label_values(&["eth0"]);
    assert_eq!(counter.get(), n);
    // Reads never decrease the value.
    assert_eq!(counter.get(), n);
}

#[test]
fn vulnerability_recording_bumps_labeled_counter() {
    let store = SecurityStore::new();
    store.record_vulnerability(Vulnerability {
        database: "orders".into(),
        user: "app".into(),
        kind: AuditKind::Tls,
        detail: "TLSError: TLS is not used for all connections".into(),
    });

    assert_eq!(
        store
            .metrics
            .db_tls_errors
            .with_label_values(&["orders", "app"])
            .get(),
        1
    );
    let vulnerabilities = store.database_vulnerabilities();
    assert_eq!(vulnerabilities.len(), 1);
    assert_eq!(vulnerabilities[0].kind, AuditKind::Tls);

    let violations = store.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].kind,
        ViolationKind::Database {
            kind: AuditKind::Tls
        }
    );
}

#[test]
fn integrity_paths_are_deduplicated() {
    let store = SecurityStore::new();
    store.record(Violation::new(ViolationKind::Integrity, "/etc/passwd", "changed"));
    store.record(Violation::new(ViolationKind::Integrity, "/etc/passwd", "changed again"));
    store.record(Violation::new(ViolationKind::Integrity, "/etc/shadow", "changed"));
    let paths = store.integrity_violated_paths();
    assert_eq!(paths.len(), 2);
}

#[test]
fn malware_dirs_are_stored_and_returned() {
    let store = SecurityStore::new();
    store.record_malware_dir("/srv/uploads");
    assert_eq!(store.malware_detected_dirs(), vec!["/srv/uploads"]);
}

#[test]
fn concurrent_snapshots_never_observe_partial_records() {
    let store = Arc::new(SecurityStore::new());
    let writer_store = Arc::clone(&store);
    let writer = std::thread::spawn(move || {
        for i in 0..1000 {
            writer_store.record(Violation::new(
                ViolationKind::DnsSpoofing,
                "eth0",
                format!("packet {i}"),
            ));
        }
    });

    let mut last_len = 0;
    while last_len < 1000 {
        let snapshot = store.violations();
        assert!(snapshot.len() >= last_len);
        for violation in &snapshot {
            assert_eq!(violation.subject, "eth0");
            assert!(violation.detail.starts_with("packet "));
        }
        last_len = snapshot.len();
    }
    writer.join().unwrap();
}

#[test]
fn metrics_text_exposition_includes_counters() {
    let store = SecurityStore::new();
    store.record(Violation::new(ViolationKind::Ddos, "eth0", "rate exceeded"));
    let text = store.metrics.encode_text();
    assert!(text.contains("ddos_attacks_total"));
    assert!(text.contains("interface=\"eth0\""));
}

// ---- scheduler ----

struct FailingDetector;

impl Detector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn run(&mut self, _store: &SecurityStore) -> Result<(), hostwatch::detectors::DetectorError> {
        Err("simulated detector failure".into())
    }
}

struct RecordingDetector;

impl Detector for RecordingDetector {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn run(&mut self, store: &SecurityStore) -> Result<(), hostwatch::detectors::DetectorError> {
        store.record(Violation::new(ViolationKind::Ddos, "eth0", "recorded"));
        Ok(())
    }
}

#[test]
fn detector_failure_does_not_abort_the_cycle() {
    let store = SecurityStore::new();
    let mut scheduler = hostwatch::Scheduler::new(
        vec![Box::new(FailingDetector), Box::new(RecordingDetector)],
        std::time::Duration::from_secs(0),
    );
    scheduler.run_cycle(&store);
    scheduler.run_cycle(&store);
    // The detector after the failing one still ran, once per cycle.
    assert_eq!(store.violations().len(), 2);
}

// ---- capture heuristics on crafted frames ----

const SRC_MAC: [u8; 6] = [0x02, 0x42, 0xac, 0x11, 0x00, 0x02];
const DST_MAC: [u8; 6] = [0x02, 0x42, 0xac, 0x11, 0x00, 0x01];

fn build_arp_frame(operation: u16) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&DST_MAC);
    frame.extend_from_slice(&SRC_MAC);
    frame.extend_from_slice(&[0x08, 0x06]); // EtherType: ARP
    frame.extend_from_slice(&[0x00, 0x01]); // hardware type: ethernet
    frame.extend_from_slice(&[0x08, 0x00]); // protocol type: IPv4
    frame.push(6); // hardware length
    frame.push(4); // protocol length
    frame.extend_from_slice(&operation.to_be_bytes());
    frame.extend_from_slice(&SRC_MAC); // sender hardware address
    frame.extend_from_slice(&[10, 0, 0, 2]); // sender protocol address
    frame.extend_from_slice(&DST_MAC); // target hardware address
    frame.extend_from_slice(&[10, 0, 0, 1]); // target protocol address
    frame
}

fn build_dns_frame(dns_payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + dns_payload.len() as u16;
    let ip_len = 20 + udp_len;

    let mut frame = Vec::new();
    frame.extend_from_slice(&DST_MAC);
    frame.extend_from_slice(&SRC_MAC);
    frame.extend_from_slice(&[0x08, 0x00]); // EtherType: IPv4

    frame.push(0x45); // version 4, IHL 5
    frame.push(0x00);
    frame.extend_from_slice(&ip_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // id, flags, fragment
    frame.push(64); // TTL
    frame.push(17); // protocol: UDP
    frame.extend_from_slice(&[0x00, 0x00]); // checksum (unverified)
    frame.extend_from_slice(&[10, 0, 0, 2]); // source
    frame.extend_from_slice(&[10, 0, 0, 1]); // destination

    frame.extend_from_slice(&53u16.to_be_bytes()); // source port
    frame.extend_from_slice(&[0xd4, 0x31]); // destination port
    frame.extend_from_slice(&udp_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]); // checksum (unverified)

    frame.extend_from_slice(dns_payload);
    frame
}

fn dns_question() -> Vec<u8> {
    let mut q = Vec::new();
    q.extend_from_slice(b"\x03www\x07example\x03com\x00");
    q.extend_from_slice(&[0x00, 0x01]); // type A
    q.extend_from_slice(&[0x00, 0x01]); // class IN
    q
}

fn dns_response(answer_count: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&[0xab, 0xcd]); // id
    payload.extend_from_slice(&[0x81, 0x80]); // response flags, no error
    payload.extend_from_slice(&1u16.to_be_bytes()); // questions
    payload.extend_from_slice(&answer_count.to_be_bytes());
    payload.extend_from_slice(&0u16.to_be_bytes()); // authority
    payload.extend_from_slice(&0u16.to_be_bytes()); // additional
    payload.extend_from_slice(&dns_question());
    for _ in 0..answer_count {
        payload.extend_from_slice(&[0xc0, 0x0c]); // name: pointer to question
        payload.extend_from_slice(&[0x00, 0x01]); // type A
        payload.extend_from_slice(&[0x00, 0x01]); // class IN
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x3c]); // TTL
        payload.extend_from_slice(&[0x00, 0x04]); // rdlength
        payload.extend_from_slice(&[1, 2, 3, 4]); // rdata
    }
    payload
}

#[test]
fn every_arp_reply_is_flagged() {
    // The default predicate looks only at the operation code, so any decoded
    // reply qualifies.
    let reply = build_arp_frame(2);
    assert!(inspect_arp_reply(&reply, heuristics::arp_reply_is_suspicious).is_some());

    let request = build_arp_frame(1);
    assert!(inspect_arp_reply(&request, heuristics::arp_reply_is_suspicious).is_none());
}

#[test]
fn arp_predicate_is_injectable() {
    fn trusting(_operation: u16) -> bool {
        false
    }
    let reply = build_arp_frame(2);
    assert!(inspect_arp_reply(&reply, trusting).is_none());
}

#[test]
fn dns_response_with_zero_answers_is_flagged() {
    let frame = build_dns_frame(&dns_response(0));
    assert!(inspect_dns(&frame).is_some());
}

#[test]
fn dns_response_with_answers_is_clean() {
    let frame = build_dns_frame(&dns_response(1));
    assert!(inspect_dns(&frame).is_none());
}

#[test]
fn well_formed_frames_pass_spoofing_checks() {
    let frame = build_dns_frame(&dns_response(1));
    assert!(inspect_ipv4_source(&frame).is_none());
    assert!(inspect_mac_source(&frame).is_none());
}

#[test]
fn address_validators() {
    assert!(heuristics::is_valid_ipv4("192.168.1.1"));
    assert!(!heuristics::is_valid_ipv4("999.1.1.1"));
    assert!(heuristics::is_valid_mac("02:42:ac:11:00:02"));
    assert!(!heuristics::is_valid_mac("0242ac110002"));
    assert!(!heuristics::is_valid_mac("02:42:ac:11:00"));
    assert!(!heuristics::is_valid_mac("02:42:ac:11:00:zz"));
}

// ---- stale accounts ----

#[test]
fn lastlog_parse_flags_never_logged_in() {
    let output = "\
Username         Port     From             Latest
root             tty1                      Mon Aug  3 09:14:21 +0000 2026
daemon                                     **Never logged in**
backup                                     **Never logged in**
ops              pts/0    10.1.2.3         Tue Aug  4 11:02:55 +0000 2026
";
    let stale = parse_lastlog(output);
    assert_eq!(stale, vec!["daemon".to_string(), "backup".to_string()]);
}
