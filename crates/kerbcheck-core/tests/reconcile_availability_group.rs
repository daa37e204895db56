//! Reconciliation of availability groups against in-memory collaborators.

mod support;

use kerbcheck_core::KerbcheckError;
use kerbcheck_core::derive::StandardSpnSource;
use kerbcheck_core::directory::SpnOwner;
use kerbcheck_core::reconcile::{ReconcileRequest, Reconciler};
use kerbcheck_core::topology::ServerIdentifier;
use support::{FakeDirectory, FakeTopology, admin, availability_group, spn_strings};

fn ag_request() -> ReconcileRequest {
    ReconcileRequest::new(ServerIdentifier::parse("sql01").unwrap()).with_availability_group("AG1")
}

#[test]
fn test_required_is_union_of_replicas_and_listener() {
    let topology = FakeTopology::new(availability_group(
        &[("sql01", "ABCORP\\sqlsvc"), ("sql02", "sqlsvc@abcorp.local")],
        "aglsn",
    ));
    let directory = FakeDirectory::new();
    let spn_source = StandardSpnSource::new();

    let report = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request())
        .unwrap();

    assert_eq!(
        spn_strings(&report.required),
        vec![
            "MSSQLSvc/aglsn:1433",
            "MSSQLSvc/sql01",
            "MSSQLSvc/sql01:1433",
            "MSSQLSvc/sql02",
            "MSSQLSvc/sql02:1433",
        ]
    );
    assert_eq!(report.missing, report.required);
    assert_eq!(report.manual_commands.len(), 5);
    assert!(
        report
            .manual_commands
            .iter()
            .all(|command| command.ends_with(" ABCORP\\sqlsvc"))
    );
}

#[test]
fn test_account_mismatch_aborts_before_directory_lookup() {
    let topology = FakeTopology::new(availability_group(
        &[("sql01", "ABCORP\\svc1"), ("sql02", "ABCORP\\svc2")],
        "aglsn",
    ));
    let directory = FakeDirectory::new();
    let spn_source = StandardSpnSource::new();

    let err = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request().with_remediation(admin()))
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<KerbcheckError>(),
        Some(&KerbcheckError::AccountMismatch {
            accounts: vec!["ABCORP\\svc1".to_string(), "ABCORP\\svc2".to_string()]
        })
    );
    assert_eq!(directory.list_calls.get(), 0);
    assert!(directory.registrations.borrow().is_empty());
}

#[test]
fn test_empty_group_is_fatal() {
    let topology = FakeTopology::empty();
    let directory = FakeDirectory::new();
    let spn_source = StandardSpnSource::new();

    let err = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request())
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<KerbcheckError>(),
        Some(KerbcheckError::EmptyAvailabilityGroup { group, .. }) if group == "AG1"
    ));
    assert_eq!(directory.list_calls.get(), 0);
}

#[test]
fn test_remediation_registers_listener_spn() {
    let topology = FakeTopology::new(availability_group(
        &[("sql01", "ABCORP\\sqlsvc"), ("sql02", "ABCORP\\sqlsvc")],
        "aglsn",
    ));
    let directory = FakeDirectory::new().with_spns(
        "ABCORP\\sqlsvc",
        &[
            "MSSQLSvc/sql01",
            "MSSQLSvc/sql01:1433",
            "MSSQLSvc/sql02",
            "MSSQLSvc/sql02:1433",
        ],
    );
    let spn_source = StandardSpnSource::new();

    let report = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request().with_remediation(admin()))
        .unwrap();

    assert_eq!(spn_strings(&report.registered), vec!["MSSQLSvc/aglsn:1433"]);
    assert_eq!(directory.registrations.borrow().len(), 1);
    assert!(report.is_compliant());
}

#[test]
fn test_virtual_account_replicas_abort_before_directory_access() {
    let topology = FakeTopology::new(availability_group(
        &[
            ("sql01", "NT Service\\MSSQLSERVER"),
            ("sql02", "NT Service\\MSSQLSERVER"),
        ],
        "aglsn",
    ));
    let directory = FakeDirectory::new();
    let spn_source = StandardSpnSource::new();

    let err = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request().with_remediation(admin()))
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<KerbcheckError>(),
        Some(&KerbcheckError::AccountMismatch {
            accounts: vec!["sql01$".to_string(), "sql02$".to_string()]
        })
    );
    assert_eq!(directory.list_calls.get(), 0);
    assert!(directory.registrations.borrow().is_empty());
}

#[test]
fn test_virtual_and_domain_account_with_same_name_mismatch() {
    let topology = FakeTopology::new(availability_group(
        &[("sql01", "NT Service\\svc"), ("sql02", "ABCORP\\svc")],
        "aglsn",
    ));
    let directory = FakeDirectory::new();
    let spn_source = StandardSpnSource::new();

    let err = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request())
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<KerbcheckError>(),
        Some(KerbcheckError::AccountMismatch { .. })
    ));
    assert_eq!(directory.list_calls.get(), 0);
}

#[test]
fn test_single_virtual_account_replica_warns() {
    let topology = FakeTopology::new(availability_group(
        &[("sql01", "NT Service\\MSSQLSERVER")],
        "aglsn",
    ));
    let directory = FakeDirectory::new();
    let spn_source = StandardSpnSource::new();

    let report = Reconciler::new(&topology, &spn_source, &directory)
        .run(&ag_request())
        .unwrap();

    assert_eq!(
        report.owner,
        SpnOwner::Machine {
            host: "sql01".to_string()
        }
    );
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("sql01$"));
}
