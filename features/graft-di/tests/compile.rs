use std::collections::BTreeMap;

use graft_config::{DuplicatePolicy, GraftConfig};
use graft_di::{
    codegen::model::{UnitKind, Visibility},
    BindingKey, CompileErrors, CompileOutput, Diagnostic, GraftCompiler, TextEmitter,
    Warning,
};

fn compile(json: &str) -> CompileOutput {
    match GraftCompiler::default().compile_json(json) {
        Ok(output) => output,
        Err(errors) => panic!("{errors}"),
    }
}

fn compile_err(json: &str) -> CompileErrors {
    GraftCompiler::default()
        .compile_json(json)
        .expect_err("compilation should fail")
}

fn render(output: &CompileOutput) -> BTreeMap<String, String> {
    let mut emitter = TextEmitter::new();
    output.emit(&mut emitter).unwrap();
    emitter.into_files()
}

fn key(text: &str) -> BindingKey {
    BindingKey::of(text).unwrap()
}

const PROVIDER_GROUP: &str = r#"{
    "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
        {"name": "foo", "provides": "Foo"}
    ]}],
    "scope_graphs": [{
        "name": "g.App", "boundary": "g",
        "provider_groups": ["a.P"],
        "provisions": [{"name": "foo", "type": "Foo"}]
    }]
}"#;

#[test]
fn provider_member_gets_an_accessor_in_its_boundary() {
    let output = compile(PROVIDER_GROUP);
    let names: Vec<_> = output.units.iter().map(|unit| unit.full_name()).collect();
    assert_eq!(names, vec!["a.GraftAppUnit", "g.GraftApp"]);

    let unit = output.unit("a.GraftAppUnit").unwrap();
    assert_eq!(unit.kind, UnitKind::Boundary);
    assert!(unit.method("provide_Foo").is_some());

    let files = render(&output);
    let top = &files["g/GraftApp.java"];
    assert!(top.contains("public final class GraftApp implements g.App {"));
    assert!(top.contains("return this.unit_a().provide_Foo();"));
    assert!(top.contains("this.a_P = new a.P();"));
    assert!(top.contains("private a.GraftAppUnit unit_a;"));
    assert!(top.contains("Not thread-safe"));

    let unit = &files["a/GraftAppUnit.java"];
    assert!(unit.starts_with("package a;"));
    assert!(unit.contains("return this.top.a_P.foo();"));
}

#[test]
fn collections_union_one_partial_per_boundary() {
    let output = compile(
        r#"{
        "provider_groups": [
            {"name": "a.A", "boundary": "a", "members": [
                {"name": "first", "provides": "Plugin", "kind": "into_set", "is_static": true},
                {"name": "declared", "provides": "Set<Plugin>", "kind": "multibinds", "is_static": true}
            ]},
            {"name": "b.B", "boundary": "b", "members": [
                {"name": "second", "provides": "Plugin", "kind": "into_set", "is_static": true}
            ]}
        ],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.A", "b.B"],
            "provisions": [{"name": "plugins", "type": "Set<Plugin>"}]
        }]
    }"#,
    );

    let aggregator = output.unit("g.GraftAppCollections").unwrap();
    assert_eq!(aggregator.kind, UnitKind::Aggregator);
    assert!(aggregator.method("provide_Set_Plugin").is_some());

    let a = output.unit("a.GraftAppUnit").unwrap();
    assert!(a.method("provide_Set_Plugin_partial").is_some());
    assert!(a.method("contribute_a_A_first").is_some());
    assert!(a.method("contribute_a_A_declared").is_none());
    let b = output.unit("b.GraftAppUnit").unwrap();
    assert!(b.method("provide_Set_Plugin_partial").is_some());

    let files = render(&output);
    let aggregator = &files["g/GraftAppCollections.java"];
    assert!(aggregator.contains("Set<Plugin> result = new java.util.LinkedHashSet<Plugin>();"));
    assert!(aggregator.contains("result.addAll(this.top.unit_a().provide_Set_Plugin_partial());"));
    assert!(aggregator.contains("result.addAll(this.top.unit_b().provide_Set_Plugin_partial());"));
    assert!(files["a/GraftAppUnit.java"].contains("result.add(this.contribute_a_A_first());"));
    assert!(files["g/GraftApp.java"].contains("return this.collections().provide_Set_Plugin();"));
}

#[test]
fn scoped_bindings_are_cached() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "bar", "provides": "Bar", "scope": "Singleton", "is_static": true}
        ]}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g", "scopes": ["Singleton"],
            "provider_groups": ["a.P"],
            "provisions": [{"name": "bar", "type": "Bar"}, {"name": "again", "type": "Bar"}]
        }],
        "scope_tree": {"root": "Singleton"}
    }"#,
    );
    let unit = output.unit("a.GraftAppUnit").unwrap();
    let memo = unit.field("bar").unwrap();
    assert_eq!(memo.visibility, Visibility::Private);
    assert!(!memo.is_final);
    assert_eq!(unit.method("provide_Bar").unwrap().visibility, Visibility::Public);
    assert_eq!(
        unit.method("provide_Bar_unscoped").unwrap().visibility,
        Visibility::Private
    );
    assert_eq!(output.stats.generation.cached, 1);

    let text = &render(&output)["a/GraftAppUnit.java"];
    assert!(text.contains("Bar value = this.bar;"));
    assert!(text.contains("value = this.provide_Bar_unscoped();"));
    assert!(text.contains("this.bar = value;"));
    assert!(text.contains("return a.P.bar();"));
}

#[test]
fn compiling_twice_renders_the_same_text() {
    let first = render(&compile(PROVIDER_GROUP));
    let second = render(&compile(PROVIDER_GROUP));
    assert_eq!(first, second);
}

#[test]
fn wrappers_call_the_inner_accessor() {
    let output = compile(
        r#"{
        "classes": [{"name": "a.Foo", "boundary": "a", "constructor": {}}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provisions": [
                {"name": "foo", "type": "Provider<a.Foo>"},
                {"name": "lazyFoo", "type": "Lazy<a.Foo>"},
                {"name": "plain", "type": "a.Foo"}
            ]
        }]
    }"#,
    );
    let unit = output.unit("a.GraftAppUnit").unwrap();
    assert_eq!(
        unit.methods.iter().filter(|method| method.name == "provide_a_Foo").count(),
        1
    );
    assert!(unit.method("provide_Provider_a_Foo").is_some());
    assert!(unit.method("provide_Lazy_a_Foo").is_some());

    let text = &render(&output)["a/GraftAppUnit.java"];
    assert!(text.contains("return new Provider<a.Foo>() {"));
    assert_eq!(text.matches("return GraftAppUnit.this.provide_a_Foo();").count(), 1);
    assert!(text.contains("if (this.value == null) {"));
    assert!(text.contains("return new a.Foo();"));
}

#[test]
fn unresolved_keys_are_reported() {
    let errors = compile_err(
        r#"{
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provisions": [{"name": "missing", "type": "Missing"}]
        }]
    }"#,
    );
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        Diagnostic::UnresolvedKey { key: missing, .. } if *missing == key("Missing")
    )));
    assert!(errors.to_string().contains("Missing"));
}

const DUPLICATE_FOO: &str = r#"{
    "provider_groups": [
        {"name": "a.P", "boundary": "a", "members": [{"name": "foo", "provides": "Foo", "is_static": true}]},
        {"name": "b.Q", "boundary": "b", "members": [{"name": "foo", "provides": "Foo", "is_static": true}]}
    ],
    "scope_graphs": [{
        "name": "g.App", "boundary": "g",
        "provider_groups": ["a.P", "b.Q"],
        "provisions": [{"name": "foo", "type": "Foo"}]
    }]
}"#;

#[test]
fn equal_priority_duplicates_conflict() {
    let errors = compile_err(DUPLICATE_FOO);
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        Diagnostic::DuplicateBinding { key: foo, .. } if *foo == key("Foo")
    )));
}

const EXTERNAL_OVERRIDE: &str = r#"{
    "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
        {"name": "foo", "provides": "Foo", "is_static": true}
    ]}],
    "external_types": [{"name": "x.Ext", "boundary": "x", "methods": [{"name": "foo", "returns": "Foo"}]}],
    "scope_graphs": [{
        "name": "g.App", "boundary": "g",
        "provider_groups": ["a.P"],
        "dependencies": ["x.Ext"],
        "provisions": [{"name": "foo", "type": "Foo"}]
    }]
}"#;

#[test]
fn higher_priority_duplicates_win_with_a_warning() {
    let output = compile(EXTERNAL_OVERRIDE);
    assert!(matches!(output.warnings[..], [Warning::DuplicateOrdered { .. }]));
    assert!(output.unit("a.GraftAppUnit").unwrap().method("provide_Foo").is_some());
    assert!(output.unit("x.GraftAppUnit").is_none());

    let top = &render(&output)["g/GraftApp.java"];
    assert!(top.contains("public GraftApp(x.Ext x_Ext) {"));
    assert!(top.contains("public final x.Ext x_Ext;"));
}

#[test]
fn strict_policy_rejects_any_duplicate() {
    let mut config = GraftConfig::default();
    config.bindings.duplicate_policy = DuplicatePolicy::Strict;
    let errors = GraftCompiler::new(config)
        .compile_json(EXTERNAL_OVERRIDE)
        .unwrap_err();
    assert!(errors
        .errors
        .iter()
        .any(|error| matches!(error, Diagnostic::DuplicateBinding { .. })));
}

#[test]
fn generic_classes_are_specialised() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "foo", "provides": "Foo", "is_static": true}
        ]}],
        "classes": [{
            "name": "a.Box", "boundary": "a", "type_params": ["T"],
            "constructor": {"params": [{"name": "value", "type": "T"}]}
        }],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.P"],
            "provisions": [{"name": "box", "type": "a.Box<Foo>"}]
        }]
    }"#,
    );
    let text = &render(&output)["a/GraftAppUnit.java"];
    assert!(text.contains("public a.Box<Foo> provide_a_Box_Foo() {"));
    assert!(text.contains("return new a.Box<Foo>(this.provide_Foo());"));
}

#[test]
fn raw_generic_requests_are_unsupported() {
    let errors = compile_err(
        r#"{
        "classes": [{
            "name": "a.Box", "boundary": "a", "type_params": ["T"],
            "constructor": {"params": [{"name": "value", "type": "T"}]}
        }],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provisions": [{"name": "box", "type": "a.Box"}]
        }]
    }"#,
    );
    assert!(errors
        .errors
        .iter()
        .any(|error| matches!(error, Diagnostic::UnsupportedGeneric { .. })));
}

#[test]
fn nested_graphs_get_a_builder() {
    let output = compile(
        r#"{
        "scope_graphs": [
            {"name": "g.App", "boundary": "g", "scopes": ["Singleton"],
             "subgraphs": [{"name": "child", "graph": "g.Child", "builder": true}]},
            {"name": "g.Child", "boundary": "g", "scopes": ["Request"],
             "bound_instances": [{"name": "request", "type": "Req"}],
             "provisions": [{"name": "req", "type": "Req"}]}
        ],
        "scope_tree": {"root": "Singleton", "parents": {"Request": "Singleton"}}
    }"#,
    );

    let child = output.unit("g.GraftChild").unwrap();
    let builder = &child.nested[0];
    assert_eq!(builder.kind, UnitKind::Builder);
    let setters: Vec<_> = builder.methods.iter().map(|method| method.name.as_str()).collect();
    assert_eq!(setters, vec!["build", "parent", "request"]);

    let files = render(&output);
    let app = &files["g/GraftApp.java"];
    assert!(app.contains("public g.Child.Builder child() {"));
    assert!(app.contains("return new g.GraftChild.Builder().parent(this);"));

    let child = &files["g/GraftChild.java"];
    assert!(child.contains("public GraftChild(g.GraftApp parent, Req request) {"));
    assert!(child.contains("public static final class Builder implements g.Child.Builder {"));
    assert!(child.contains("return new g.GraftChild(this.parent, this.request);"));
    assert!(files["g/GraftChildUnit.java"].contains("return this.top.request;"));
}

#[test]
fn nested_graphs_reach_parent_bindings() {
    let output = compile(
        r#"{
        "provider_groups": [
            {"name": "a.Root", "boundary": "a", "members": [
                {"name": "db", "provides": "Db", "is_static": true, "scope": "Singleton"}
            ]},
            {"name": "a.Session", "boundary": "a", "members": [
                {"name": "user", "provides": "User", "is_static": true, "params": [{"name": "db", "type": "Db"}]}
            ]}
        ],
        "scope_graphs": [
            {"name": "g.App", "boundary": "g", "scopes": ["Singleton"], "provider_groups": ["a.Root"],
             "subgraphs": [{"name": "session", "graph": "g.SessionGraph"}]},
            {"name": "g.SessionGraph", "boundary": "g", "scopes": ["Session"], "provider_groups": ["a.Session"],
             "provisions": [{"name": "user", "type": "User"}]}
        ],
        "scope_tree": {"root": "Singleton", "parents": {"Session": "Singleton"}}
    }"#,
    );
    let files = render(&output);
    assert!(files["g/GraftApp.java"].contains("return new g.GraftSessionGraph(this);"));
    let session_unit = output
        .units
        .iter()
        .find(|unit| unit.method("provide_User").is_some())
        .unwrap();
    assert_eq!(session_unit.full_name(), "a.GraftSessionGraphUnit");
    assert!(files["a/GraftSessionGraphUnit.java"]
        .contains("return a.Session.user(this.top.parent.unit_a().provide_Db());"));
}

#[test]
fn bindings_of_inner_scopes_are_not_visible_outside() {
    let errors = compile_err(
        r#"{
        "classes": [{"name": "a.User", "boundary": "a", "scope": "Session", "constructor": {}}],
        "scope_graphs": [
            {"name": "g.App", "boundary": "g", "scopes": ["Singleton"],
             "subgraphs": [{"name": "session", "graph": "g.SessionGraph"}],
             "provisions": [{"name": "user", "type": "a.User"}]},
            {"name": "g.SessionGraph", "boundary": "g", "scopes": ["Session"]}
        ],
        "scope_tree": {"root": "Singleton", "parents": {"Session": "Singleton"}}
    }"#,
    );
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        Diagnostic::NotVisible { scope, from, .. } if scope == "Session" && from == "Singleton"
    )));
}

#[test]
fn keyed_collections_and_views() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "c.Routes", "boundary": "c", "members": [
            {"name": "home", "provides": "Handler", "is_static": true,
             "kind": {"into_map": {"map_key": {"ty": "String", "value": "\"home\""}}}},
            {"name": "about", "provides": "Handler", "is_static": true,
             "kind": {"into_map": {"map_key": {"ty": "String", "value": "\"about\""}}}}
        ]}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["c.Routes"],
            "provisions": [
                {"name": "routes", "type": "Map<String, Handler>"},
                {"name": "lazyRoutes", "type": "Map<String, Provider<Handler>>"}
            ]
        }]
    }"#,
    );
    let files = render(&output);
    let partial = &files["c/GraftAppUnit.java"];
    assert!(partial.contains("result.put(\"about\", this.contribute_c_Routes_about());"));
    assert!(partial.contains("result.put(\"home\", this.contribute_c_Routes_home());"));
    assert!(files["g/GraftAppCollections.java"]
        .contains("result.putAll(this.top.unit_c().provide_Map_String_Handler_partial());"));

    let view = &files["g/GraftAppUnit.java"];
    assert!(view.contains("result.put(\"home\", new Provider<Handler>() {"));
    assert!(view.contains("return GraftAppUnit.this.top.unit_c().contribute_c_Routes_home();"));
}

#[test]
fn colliding_map_keys_are_reported() {
    let errors = compile_err(
        r#"{
        "provider_groups": [{"name": "c.Routes", "boundary": "c", "members": [
            {"name": "home", "provides": "Handler", "is_static": true,
             "kind": {"into_map": {"map_key": {"ty": "String", "value": "\"home\""}}}},
            {"name": "other", "provides": "Handler", "is_static": true,
             "kind": {"into_map": {"map_key": {"ty": "String", "value": "\"home\""}}}}
        ]}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["c.Routes"],
            "provisions": [{"name": "routes", "type": "Map<String, Handler>"}]
        }]
    }"#,
    );
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        Diagnostic::KeyedCollision { boundary, .. } if boundary == "c"
    )));
}

#[test]
fn optionals_follow_their_declaration() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "bar", "provides": "Bar", "is_static": true},
            {"name": "maybeFoo", "provides": "Foo", "kind": "binds_optional_of"},
            {"name": "maybeBar", "provides": "Bar", "kind": "binds_optional_of"}
        ]}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.P"],
            "provisions": [
                {"name": "foo", "type": "Optional<Foo>"},
                {"name": "bar", "type": "Optional<Bar>"}
            ]
        }]
    }"#,
    );
    let text = &render(&output)["g/GraftAppUnit.java"];
    assert!(text.contains("return Optional.empty();"));
    assert!(text.contains("return Optional.of(this.top.unit_a().provide_Bar());"));
}

#[test]
fn members_are_injected_ancestors_first() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "foo", "provides": "Foo", "is_static": true}
        ]}],
        "classes": [
            {"name": "a.Base", "boundary": "a", "fields": [{"name": "dep", "type": "Foo"}]},
            {"name": "a.Child", "boundary": "a", "superclass": "a.Base",
             "methods": [{"name": "init", "params": [{"name": "foo", "type": "Foo"}]}]}
        ],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.P"],
            "injections": [{"name": "inject", "target": "a.Child"}]
        }]
    }"#,
    );
    let files = render(&output);
    assert!(files["g/GraftApp.java"].contains("this.unit_a().inject_a_Child(instance);"));
    let unit = &files["a/GraftAppUnit.java"];
    assert!(unit.contains("public void inject_a_Child(a.Child instance) {"));
    assert!(unit.contains("this.inject_a_Base(instance);"));
    assert!(unit.contains("instance.init(this.provide_Foo());"));
    assert!(unit.contains("instance.dep = this.provide_Foo();"));
}

#[test]
fn generated_members_are_sorted() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "zed", "provides": "Zed", "is_static": true},
            {"name": "alpha", "provides": "Alpha", "is_static": true}
        ]}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.P"],
            "provisions": [{"name": "zed", "type": "Zed"}, {"name": "alpha", "type": "Alpha"}]
        }]
    }"#,
    );
    let unit = output.unit("a.GraftAppUnit").unwrap();
    let methods: Vec<_> = unit.methods.iter().map(|method| method.name.as_str()).collect();
    assert_eq!(methods, vec!["provide_Alpha", "provide_Zed"]);
}

#[test]
fn provider_groups_of_inner_scopes_are_unresolved_outside() {
    let errors = compile_err(
        r#"{
        "provider_groups": [{"name": "a.S", "boundary": "a", "members": [
            {"name": "user", "provides": "User", "is_static": true}
        ]}],
        "scope_graphs": [
            {"name": "g.App", "boundary": "g", "scopes": ["Singleton"],
             "subgraphs": [{"name": "session", "graph": "g.SessionGraph"}],
             "provisions": [{"name": "user", "type": "User"}]},
            {"name": "g.SessionGraph", "boundary": "g", "scopes": ["Session"], "provider_groups": ["a.S"]}
        ],
        "scope_tree": {"root": "Singleton", "parents": {"Session": "Singleton"}}
    }"#,
    );
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        Diagnostic::UnresolvedKey { key: user, .. } if *user == key("User")
    )));
}

#[test]
fn collections_gather_contributions_per_scope_node() {
    let output = compile(
        r#"{
        "provider_groups": [
            {"name": "a.Core", "boundary": "a", "members": [
                {"name": "core", "provides": "Plugin", "kind": "into_set", "is_static": true}
            ]},
            {"name": "b.Extra", "boundary": "b", "members": [
                {"name": "extra", "provides": "Plugin", "kind": "into_set", "is_static": true}
            ]}
        ],
        "scope_graphs": [
            {"name": "g.App", "boundary": "g", "scopes": ["Singleton"], "provider_groups": ["a.Core"],
             "subgraphs": [{"name": "session", "graph": "g.SessionGraph"}],
             "provisions": [{"name": "plugins", "type": "Set<Plugin>"}]},
            {"name": "g.SessionGraph", "boundary": "g", "scopes": ["Session"], "provider_groups": ["b.Extra"],
             "provisions": [{"name": "plugins", "type": "Set<Plugin>"}]}
        ],
        "scope_tree": {"root": "Singleton", "parents": {"Session": "Singleton"}}
    }"#,
    );
    let files = render(&output);

    let root = &files["g/GraftAppCollections.java"];
    assert!(root.contains("result.addAll(this.top.unit_a().provide_Set_Plugin_partial());"));
    assert!(!root.contains("unit_b"));

    let session = &files["g/GraftSessionGraphCollections.java"];
    assert!(session.contains("result.addAll(this.top.unit_a().provide_Set_Plugin_partial());"));
    assert!(session.contains("result.addAll(this.top.unit_b().provide_Set_Plugin_partial());"));
    assert!(files["g/GraftSessionGraph.java"].contains("return this.collections().provide_Set_Plugin();"));

    // The root contribution stays at the root, the session partial calls up to it
    assert!(files["a/GraftSessionGraphUnit.java"]
        .contains("result.add(this.top.parent.unit_a().contribute_a_Core_core());"));
    assert!(!files["a/GraftSessionGraphUnit.java"].contains("public Plugin contribute_a_Core_core()"));
    assert!(files["b/GraftSessionGraphUnit.java"].contains("result.add(this.contribute_b_Extra_extra());"));
}

#[test]
fn shared_provider_group_serves_sibling_graphs() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.Shared", "boundary": "a", "members": [
            {"name": "clock", "provides": "Clock", "is_static": true}
        ]}],
        "scope_graphs": [
            {"name": "g.Root", "boundary": "g", "subgraphs": [
                {"name": "one", "graph": "g.One"},
                {"name": "two", "graph": "g.Two"}
            ]},
            {"name": "g.One", "boundary": "g", "provider_groups": ["a.Shared"],
             "provisions": [{"name": "clock", "type": "Clock"}]},
            {"name": "g.Two", "boundary": "g", "provider_groups": ["a.Shared"],
             "provisions": [{"name": "clock", "type": "Clock"}]}
        ]
    }"#,
    );
    assert!(output.unit("a.GraftOneUnit").unwrap().method("provide_Clock").is_some());
    assert!(output.unit("a.GraftTwoUnit").unwrap().method("provide_Clock").is_some());
    assert!(output.unit("a.GraftRootUnit").is_none());

    let files = render(&output);
    assert!(files["g/GraftOne.java"].contains("return this.unit_a().provide_Clock();"));
    assert!(files["g/GraftTwo.java"].contains("return this.unit_a().provide_Clock();"));
}

#[test]
fn sibling_graphs_bind_their_own_instances() {
    let output = compile(
        r#"{
        "scope_graphs": [
            {"name": "g.Root", "boundary": "g", "subgraphs": [
                {"name": "one", "graph": "g.One", "builder": true},
                {"name": "two", "graph": "g.Two", "builder": true}
            ]},
            {"name": "g.One", "boundary": "g", "bound_instances": [{"name": "req", "type": "Req"}],
             "provisions": [{"name": "req", "type": "Req"}]},
            {"name": "g.Two", "boundary": "g", "bound_instances": [{"name": "req", "type": "Req"}],
             "provisions": [{"name": "req", "type": "Req"}]}
        ]
    }"#,
    );
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);

    let files = render(&output);
    assert!(files["g/GraftOneUnit.java"].contains("return this.top.req;"));
    assert!(files["g/GraftTwoUnit.java"].contains("return this.top.req;"));
    assert!(files["g/GraftOne.java"].contains("public GraftOne(g.GraftRoot parent, Req req) {"));
    assert!(files["g/GraftTwo.java"].contains("public GraftTwo(g.GraftRoot parent, Req req) {"));
}

#[test]
fn qualifiers_mangling_alike_get_distinct_accessors() {
    let output = compile(
        r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "dotted", "provides": "String", "qualifier": "api.url", "is_static": true},
            {"name": "flat", "provides": "String", "qualifier": "api_url", "is_static": true}
        ]}],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.P"],
            "provisions": [
                {"name": "dotted", "type": "String", "qualifier": "api.url"},
                {"name": "flat", "type": "String", "qualifier": "api_url"}
            ]
        }]
    }"#,
    );
    let unit = output.unit("a.GraftAppUnit").unwrap();
    let accessors: Vec<_> = unit.methods.iter().map(|method| method.name.as_str()).collect();
    assert_eq!(accessors, vec!["provide_api_url_String", "provide_api_url_String_2"]);

    let files = render(&output);
    let unit = &files["a/GraftAppUnit.java"];
    assert!(unit.contains("return a.P.dotted();"));
    assert!(unit.contains("return a.P.flat();"));
    let top = &files["g/GraftApp.java"];
    assert!(top.contains("return this.unit_a().provide_api_url_String();"));
    assert!(top.contains("return this.unit_a().provide_api_url_String_2();"));
}

#[test]
fn packages_mangling_alike_get_distinct_unit_getters() {
    let output = compile(
        r#"{
        "provider_groups": [
            {"name": "a.b.P", "boundary": "a.b", "members": [
                {"name": "foo", "provides": "Foo", "is_static": true}
            ]},
            {"name": "a_b.Q", "boundary": "a_b", "members": [
                {"name": "bar", "provides": "Bar", "is_static": true}
            ]}
        ],
        "scope_graphs": [{
            "name": "g.App", "boundary": "g",
            "provider_groups": ["a.b.P", "a_b.Q"],
            "provisions": [{"name": "foo", "type": "Foo"}, {"name": "bar", "type": "Bar"}]
        }]
    }"#,
    );
    let top = output.unit("g.GraftApp").unwrap();
    assert!(top.method("unit_a_b").is_some());
    assert!(top.method("unit_a_b_2").is_some());

    let files = render(&output);
    let top = &files["g/GraftApp.java"];
    assert!(top.contains("return this.unit_a_b().provide_Foo();"));
    assert!(top.contains("return this.unit_a_b_2().provide_Bar();"));
    assert!(top.contains("private a.b.GraftAppUnit unit_a_b;"));
    assert!(top.contains("private a_b.GraftAppUnit unit_a_b_2;"));
}
