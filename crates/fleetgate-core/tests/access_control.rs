mod common;

use common::{json, kwargs, RecordingBackend};
use fleetgate_core::policy::{
    AclEntry, AclRuleSpec, AclTable, DispatchRuleSpec, DispatchTable, GrantDecision, HostKind,
    HostRecord, TypeCatalog,
};
use fleetgate_core::{
    AccessControl, Authenticator, BackendHostLookup, BackendRegistry, Entity, Error, Kwargs,
    OperationCatalog, Router, StaticCredentials, StaticHostDirectory, Value,
};
use serde_json::json;
use std::sync::Arc;

fn acl(rules: Vec<(&str, Vec<AclEntry>)>) -> AclTable {
    let specs: Vec<AclRuleSpec> = rules
        .into_iter()
        .map(|(pattern, entries)| AclRuleSpec::new(pattern, entries))
        .collect();
    AclTable::compile(&specs).unwrap()
}

fn authenticator() -> Authenticator {
    let users = StaticCredentials::new()
        .with_user("admin", "adminpw", ["admin", "opsiadmin"])
        .with_user("reader", "readerpw", ["opsireadonly"]);
    let hosts = StaticHostDirectory::new()
        .with_host(HostRecord::new("pc1.uib.local", HostKind::Client).with_secret_key("key1"))
        .with_host(HostRecord::new("depot.uib.local", HostKind::DepotServer).with_secret_key("key2"));
    Authenticator::new(Arc::new(users)).with_host_lookup(Arc::new(hosts))
}

fn hosts() -> Value {
    json(json!([
        {"id": "pc1.uib.local", "description": "mine", "opsiHostKey": "key1"},
        {"id": "pc2.uib.local", "description": "theirs", "opsiHostKey": "key3"},
    ]))
}

fn backend() -> Arc<RecordingBackend> {
    RecordingBackend::new()
        .returning("host_getObjects", hosts())
        .returning("host_updateObjects", Value::None)
        .returning("backend_info", json(json!({"version": "4.1"})))
        .shared()
}

fn protected() -> OperationCatalog {
    OperationCatalog::new(["host_getObjects", "host_updateObjects"])
}

fn engine(
    backend: &Arc<RecordingBackend>,
    table: AclTable,
    user: &str,
    secret: &str,
) -> AccessControl {
    AccessControl::builder(backend.clone())
        .credentials(user, secret)
        .acl(table)
        .protected(protected())
        .authenticate(&authenticator())
        .unwrap()
}

#[test]
fn test_scenario_c_full_grant_unfiltered() {
    let backend = backend();
    let table = acl(vec![(".*", vec![AclEntry::sys_group(["admin"])])]);
    let engine = engine(&backend, table, "admin", "adminpw");
    let result = engine.call("host_getObjects", Kwargs::new()).unwrap();
    assert_eq!(result, hosts());
}

#[test]
fn test_scenario_d_self_owned_filters_objects() {
    let backend = backend();
    let table = acl(vec![("^host_getObjects$", vec![AclEntry::self_owned()])]);
    let engine = engine(&backend, table, "pc1.uib.local", "key1");
    let result = engine.call("host_getObjects", kwargs(&[("id", Value::from("pc1.uib.local"))])).unwrap();
    assert_eq!(
        result,
        json(json!([{"id": "pc1.uib.local", "description": "mine", "opsiHostKey": "key1"}]))
    );
}

#[test]
fn test_scenario_d_nothing_owned_is_empty_list() {
    let backend = backend();
    let table = acl(vec![("^host_getObjects$", vec![AclEntry::self_owned()])]);
    let engine = engine(&backend, table, "depot.uib.local", "key2");
    let result = engine.call("host_getObjects", kwargs(&[("id", Value::from("x"))])).unwrap();
    assert_eq!(result, Value::List(vec![]));
}

#[test]
fn test_denied_never_reaches_backend() {
    let backend = backend();
    let table = acl(vec![(".*", vec![AclEntry::sys_group(["admin"])])]);
    let engine = engine(&backend, table, "reader", "readerpw");
    let err = engine.call("host_getObjects", Kwargs::new()).unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(err.exit_code(), 3);
    assert_eq!(backend.call_count(), 0);
}

#[test]
fn test_first_acl_rule_only() {
    let backend = backend();
    let table = acl(vec![
        ("^host_", vec![AclEntry::sys_user(["nobody"])]),
        (".*", vec![AclEntry::all()]),
    ]);
    let engine = engine(&backend, table, "admin", "adminpw");
    assert_eq!(engine.authorize("host_getObjects"), GrantDecision::Denied);
    assert!(engine.call("host_getObjects", Kwargs::new()).is_err());
}

#[test]
fn test_attribute_restriction_on_result() {
    let backend = backend();
    let table = acl(vec![(".*", vec![AclEntry::all().deny(["opsiHostKey"])])]);
    let engine = engine(&backend, table, "reader", "readerpw");
    let result = engine.call("host_getObjects", kwargs(&[("id", Value::from("x"))])).unwrap();
    assert_eq!(
        result,
        json(json!([
            {"id": "pc1.uib.local", "description": "mine"},
            {"id": "pc2.uib.local", "description": "theirs"},
        ]))
    );
}

#[test]
fn test_scenario_d_without_params_reaches_backend() {
    let backend = backend();
    let table = acl(vec![("^host_getObjects$", vec![AclEntry::self_owned()])]);
    let engine = engine(&backend, table, "pc1.uib.local", "key1");
    let result = engine.call("host_getObjects", Kwargs::new()).unwrap();
    assert_eq!(
        result,
        json(json!([{"id": "pc1.uib.local", "description": "mine", "opsiHostKey": "key1"}]))
    );
    assert_eq!(backend.call_count(), 1);
    assert!(backend.calls()[0].1.is_empty());
}

#[test]
fn test_all_operations_protected_by_default() {
    let backend = backend();
    let engine = AccessControl::builder(backend.clone())
        .credentials("reader", "readerpw")
        .authenticate(&authenticator())
        .unwrap();
    assert!(engine.is_protected("backend_info"));
    let err = engine.call("host_getObjects", Kwargs::new()).unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(backend.call_count(), 0);
}

#[test]
fn test_router_admin_operations_always_protected() {
    let store = backend();
    let registry = Arc::new(BackendRegistry::new().with_backend("file", store.clone()));
    let dispatch = DispatchTable::compile(&[DispatchRuleSpec::new(".*", ["file"])]).unwrap();
    let catalog = OperationCatalog::from_registry(&registry);
    let router = Arc::new(Router::new(dispatch, registry, &catalog));
    let engine = AccessControl::builder(router)
        .credentials("reader", "readerpw")
        .acl(acl(vec![(".*", vec![AclEntry::sys_user(["nobody"])])]))
        .protected(catalog)
        .authenticate(&authenticator())
        .unwrap();

    for operation in [
        "backend_exit",
        "backend_setOptions",
        "backend_getOptions",
        "dispatcher_getConfig",
        "dispatcher_getBackendNames",
    ] {
        assert!(engine.is_protected(operation), "{operation}");
        let err = engine.call(operation, Kwargs::new()).unwrap_err();
        assert!(err.is_permission_denied(), "{operation}");
    }
    assert_eq!(store.exit_count(), 0);
    assert_eq!(store.call_count(), 0);
}

#[test]
fn test_foreign_objects_in_params_are_denied() {
    let backend = backend();
    let table = acl(vec![(".*", vec![AclEntry::self_owned()])]);
    let engine = engine(&backend, table, "pc1.uib.local", "key1");

    let foreign = Value::List(vec![Value::Object(
        Entity::new("OpsiClient").with_attribute("id", "pc2.uib.local"),
    )]);
    let err = engine
        .call("host_updateObjects", kwargs(&[("hosts", foreign)]))
        .unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(backend.call_count(), 0);

    let own = Value::Object(Entity::new("OpsiClient").with_attribute("id", "pc1.uib.local"));
    engine
        .call("host_updateObjects", kwargs(&[("hosts", own.clone())]))
        .unwrap();
    assert_eq!(backend.calls()[0].1["hosts"], own);
}

#[test]
fn test_params_stripped_to_allowed_attributes() {
    let backend = backend();
    let table = acl(vec![(".*", vec![AclEntry::all().allow(["description"])])]);
    let types = TypeCatalog::new().with_type("OpsiClient", ["id"]);
    let engine = AccessControl::builder(backend.clone())
        .credentials("reader", "readerpw")
        .acl(table)
        .protected(protected())
        .types(types)
        .authenticate(&authenticator())
        .unwrap();

    let host = Entity::new("OpsiClient")
        .with_attribute("id", "pc2.uib.local")
        .with_attribute("description", "new")
        .with_attribute("opsiHostKey", "stolen");
    engine
        .call("host_updateObjects", kwargs(&[("hosts", Value::List(vec![Value::Object(host)]))]))
        .unwrap();

    let sent = backend.calls()[0].1["hosts"].clone();
    let Value::List(items) = sent else { panic!("expected list") };
    let entity = items[0].as_entity().unwrap();
    assert!(entity.get("opsiHostKey").is_none());
    assert_eq!(entity.get_str("id"), Some("pc2.uib.local"));
    assert_eq!(entity.get_str("description"), Some("new"));
}

#[test]
fn test_unprotected_operations_pass_through() {
    let backend = backend();
    let table = acl(vec![(".*", vec![AclEntry::sys_user(["nobody"])])]);
    let engine = engine(&backend, table, "reader", "readerpw");
    assert!(!engine.is_protected("backend_info"));
    let info = engine.call("backend_info", Kwargs::new()).unwrap();
    assert_eq!(info, json(json!({"version": "4.1"})));
}

#[test]
fn test_unknown_operation() {
    let backend = backend();
    let engine = engine(&backend, AclTable::default(), "admin", "adminpw");
    let err = engine.call("product_getObjects", Kwargs::new()).unwrap_err();
    assert!(matches!(err, Error::UnknownOperation { .. }));
}

#[test]
fn test_builtin_operations() {
    let backend = backend();
    let admin = engine(&backend, AclTable::default(), "admin", "adminpw");
    let reader = AccessControl::builder(backend.clone())
        .credentials("reader", "readerpw")
        .read_only_groups(["opsireadonly"])
        .authenticate(&authenticator())
        .unwrap();
    let depot = engine(&backend, AclTable::default(), "depot.uib.local", "key2");

    let ask = |engine: &AccessControl, op: &str| engine.call(op, Kwargs::new()).unwrap();
    assert_eq!(ask(&admin, "accessControl_authenticated"), Value::Bool(true));
    assert_eq!(ask(&admin, "accessControl_userIsAdmin"), Value::Bool(true));
    assert_eq!(ask(&admin, "accessControl_userIsReadOnlyUser"), Value::Bool(false));
    assert_eq!(ask(&reader, "accessControl_userIsAdmin"), Value::Bool(false));
    assert_eq!(ask(&reader, "accessControl_userIsReadOnlyUser"), Value::Bool(true));
    assert_eq!(ask(&depot, "accessControl_userIsAdmin"), Value::Bool(true));
}

#[test]
fn test_default_acl_admin_group_only() {
    let backend = backend();
    let admin = engine(&backend, AclTable::default(), "admin", "adminpw");
    assert!(admin.call("host_getObjects", Kwargs::new()).is_ok());

    let reader = engine(&backend, AclTable::default(), "reader", "readerpw");
    assert!(reader.call("host_getObjects", Kwargs::new()).unwrap_err().is_permission_denied());
}

#[test]
fn test_failed_authentication_builds_nothing() {
    let err = AccessControl::builder(backend())
        .credentials("admin", "wrong")
        .authenticate(&authenticator())
        .unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_engine_over_router_with_backend_host_lookup() {
    let store = RecordingBackend::new()
        .returning(
            "host_getObjects",
            Value::List(vec![Value::Object(
                Entity::new("OpsiConfigserver")
                    .with_attribute("id", "config.uib.local")
                    .with_attribute("opsiHostKey", "cfgkey"),
            )]),
        )
        .shared();
    let registry = Arc::new(BackendRegistry::new().with_backend("file", store.clone()));
    let dispatch =
        DispatchTable::compile(&[DispatchRuleSpec::new(".*", ["file"])]).unwrap();
    let catalog = OperationCatalog::from_registry(&registry);
    let router = Arc::new(Router::new(dispatch, registry, &catalog));

    let auth = Authenticator::new(Arc::new(StaticCredentials::new()))
        .with_host_lookup(Arc::new(BackendHostLookup::new(router.clone()).unwrap()));
    let engine = AccessControl::builder(router)
        .credentials("Config.UIB.local", "cfgkey")
        .acl(acl(vec![(".*", vec![AclEntry::new(
            fleetgate_core::policy::AclEntryType::OpsiDepotserver,
        )])]))
        .protected(catalog)
        .authenticate(&auth)
        .unwrap();

    assert_eq!(engine.principal().name(), "config.uib.local");
    assert!(engine.user_is_admin());
    assert_eq!(store.calls()[0].1["id"], Value::from("config.uib.local"));
    assert!(engine.call("host_getObjects", Kwargs::new()).is_ok());
    assert!(engine.operations().contains(&"dispatcher_getConfig".to_string()));
}

#[test]
fn test_backend_host_lookup_requires_host_get_objects() {
    let err = BackendHostLookup::new(RecordingBackend::new().shared()).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_stack_from_configuration() {
    let config = fleetgate_core::policy::GateConfig::from_yaml_str(
        r#"
dispatch:
  - pattern: "^host_"
    backends: [file]
acl:
  - pattern: "^host_getObjects$"
    entries:
      - type: sys_group
        ids: [fleet]
        deny_attributes: [opsiHostKey]
force_groups: [fleet]
read_only_groups: [fleet]
"#,
    )
    .unwrap();

    let store = backend();
    let registry = Arc::new(BackendRegistry::new().with_backend("file", store));
    let catalog = OperationCatalog::from_registry(&registry);
    let router = Arc::new(Router::from_config(&config, registry, &catalog).unwrap());

    let engine = AccessControl::builder(router)
        .credentials("reader", "readerpw")
        .config(&config)
        .unwrap()
        .protected(catalog)
        .authenticate(&authenticator().configure(&config))
        .unwrap();

    assert!(engine.user_is_read_only());
    assert!(!engine.user_is_admin());
    let result = engine
        .call("host_getObjects", kwargs(&[("id", Value::from("pc1.uib.local"))]))
        .unwrap();
    assert_eq!(
        result,
        json(json!([
            {"id": "pc1.uib.local", "description": "mine"},
            {"id": "pc2.uib.local", "description": "theirs"},
        ]))
    );
    let err = engine.call("host_updateObjects", Kwargs::new()).unwrap_err();
    assert!(err.is_permission_denied());
}
