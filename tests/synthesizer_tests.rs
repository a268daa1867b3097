mod common;

use std::sync::Arc;

use common::{greeter_contract, session_with_root, ENGLISH_GREETER, GREETER};
use tolc_synth::codegen::JType;
use tolc_synth::synth::FieldSpec;
use tolc_synth::{CompilationSession, MethodMeta, NameAllocator, TypeMeta, Value, WrapperSpec};

#[test]
fn test_delegating_wrapper_round_trip() {
    common::init_logging();
    let session = session_with_root("roundtrip");
    session.add_source("demo.Greeter", GREETER).unwrap();
    let english = session.add_source("demo.EnglishGreeter", ENGLISH_GREETER).unwrap();
    let wrapper = session
        .add_wrapper(WrapperSpec::new(vec![greeter_contract()], TypeMeta::class("demo.EnglishGreeter")))
        .unwrap();
    assert_eq!(wrapper.class_name(), "generated.roundtrip.demo.Greeter1");

    let classes = session.compile().unwrap();
    let delegate = classes[&english].new_instance(&[]).unwrap();
    let adapter_class = &classes[&wrapper];
    assert!(adapter_class.is_assignable_to("demo.Greeter"));

    let adapter = adapter_class.new_instance(&[Value::Ref(delegate)]).unwrap();
    let greeting = adapter.invoke("greet", &[Value::string("World").unwrap()]).unwrap();
    assert_eq!(greeting.as_str(), Some("Hello, World"));
}

#[test]
fn test_default_and_static_methods_are_inherited() {
    let session = session_with_root("defaults");
    session
        .add_source(
            "demo.Counter",
            r#"package demo;

public interface Counter {
    int next();

    default int twice() {
        return next() + next();
    }

    static int zero() {
        return 0;
    }
}
"#,
        )
        .unwrap();
    let fixed = session
        .add_source("demo.Fixed", "package demo;\n\npublic class Fixed {\n    public int next() {\n        return 5;\n    }\n}\n")
        .unwrap();
    let contract = TypeMeta::interface("demo.Counter")
        .method(MethodMeta::new("next", JType::Int))
        .method(MethodMeta::new("twice", JType::Int).into_default())
        .method(MethodMeta::new("zero", JType::Int).into_static());
    let wrapper = session.add_wrapper(WrapperSpec::new(vec![contract], TypeMeta::class("demo.Fixed"))).unwrap();
    assert_eq!(wrapper.source().matches("public int ").count(), 1);
    assert!(!wrapper.source().contains("twice"));
    assert!(!wrapper.source().contains("zero"));

    let classes = session.compile().unwrap();
    let delegate = classes[&fixed].new_instance(&[]).unwrap();
    let adapter = classes[&wrapper].new_instance(&[Value::Ref(delegate)]).unwrap();
    assert_eq!(adapter.invoke("next", &[]).unwrap().as_int(), Some(5));
    assert_eq!(adapter.invoke("twice", &[]).unwrap().as_int(), Some(10));
}

#[test]
fn test_method_writer_override_takes_precedence() {
    let session = session_with_root("override");
    session.add_source("demo.Greeter", GREETER).unwrap();
    session.add_source("demo.EnglishGreeter", ENGLISH_GREETER).unwrap();
    let spec = WrapperSpec::new(vec![greeter_contract()], TypeMeta::class("demo.EnglishGreeter")).method_writer(|context| {
        let name = context.parameter_names().remove(0);
        context.set_body(format!("return \"Hi \" + {};", name));
    });
    let wrapper = session.add_wrapper(spec).unwrap();
    assert!(!wrapper.source().contains("delegate.greet"));

    let classes = session.compile().unwrap();
    let adapter = classes[&wrapper].new_instance(&[Value::Null]).unwrap();
    let greeting = adapter.invoke("greet", &[Value::string("Ada").unwrap()]).unwrap();
    assert_eq!(greeting.as_str(), Some("Hi Ada"));
}

#[test]
fn test_wrapped_return_value() {
    let session = session_with_root("wrap");
    session
        .add_source(
            "demo.Label",
            r#"package demo;

public class Label {
    private final String text;

    public Label(String text) {
        this.text = text;
    }

    public String render() {
        return "[" + text + "]";
    }
}
"#,
        )
        .unwrap();
    session.add_source("demo.Source", "package demo;\n\npublic interface Source {\n    Label fetch();\n}\n").unwrap();
    let store = session
        .add_source("demo.Store", "package demo;\n\npublic class Store {\n    public String fetch() {\n        return \"stored\";\n    }\n}\n")
        .unwrap();
    let contract = TypeMeta::interface("demo.Source").method(MethodMeta::new("fetch", JType::class("demo.Label")));
    let spec = WrapperSpec::new(vec![contract], TypeMeta::class("demo.Store")).method_writer(|context| context.wrap_return_in("demo.Label"));
    let wrapper = session.add_wrapper(spec).unwrap();

    let classes = session.compile().unwrap();
    let delegate = classes[&store].new_instance(&[]).unwrap();
    let adapter = classes[&wrapper].new_instance(&[Value::Ref(delegate)]).unwrap();
    let label = adapter.invoke("fetch", &[]).unwrap();
    let label = label.as_object().unwrap();
    assert_eq!(label.class().name(), "demo.Label");
    assert_eq!(label.invoke("render", &[]).unwrap().as_str(), Some("[stored]"));
}

#[test]
fn test_checked_exceptions_are_declared_and_propagate() {
    let session = session_with_root("throws");
    session
        .add_source(
            "demo.Sink",
            "package demo;\n\nimport java.io.IOException;\n\npublic interface Sink {\n    void write(int value) throws IOException;\n}\n",
        )
        .unwrap();
    let full = session
        .add_source(
            "demo.FullDisk",
            r#"package demo;

import java.io.IOException;

public class FullDisk {
    public void write(int value) throws IOException {
        throw new IOException("disk full");
    }
}
"#,
        )
        .unwrap();
    let contract = TypeMeta::interface("demo.Sink")
        .method(MethodMeta::new("write", JType::Void).param(JType::Int).throws("java.io.IOException"));
    let wrapper = session.add_wrapper(WrapperSpec::new(vec![contract], TypeMeta::class("demo.FullDisk"))).unwrap();
    assert_eq!(wrapper.class_name(), "generated.throws_.demo.Sink1");
    assert!(wrapper.source().contains("throws java.io.IOException"));

    let classes = session.compile().unwrap();
    let delegate = classes[&full].new_instance(&[]).unwrap();
    let adapter = classes[&wrapper].new_instance(&[Value::Ref(delegate)]).unwrap();
    let error = adapter.invoke("write", &[Value::Int(1)]).unwrap_err();
    assert_eq!(error.exception_class(), Some("java.io.IOException"));
    assert!(error.to_string().contains("disk full"));
}

#[test]
fn test_missing_throws_clause_is_a_compile_error() {
    let session = session_with_root("nothrows");
    session.add_source("demo.Sink", "package demo;\n\npublic interface Sink {\n    void write(int value);\n}\n").unwrap();
    session
        .add_source(
            "demo.FullDisk",
            "package demo;\n\npublic class FullDisk {\n    public void write(int value) throws java.io.IOException {\n    }\n}\n",
        )
        .unwrap();
    let contract = TypeMeta::interface("demo.Sink").method(MethodMeta::new("write", JType::Void).param(JType::Int));
    session.add_wrapper(WrapperSpec::new(vec![contract], TypeMeta::class("demo.FullDisk"))).unwrap();

    let error = session.compile().unwrap_err();
    assert!(error.is_compile());
    assert!(error
        .diagnostics()
        .iter()
        .any(|d| d.message == "unreported exception IOException; must be caught or declared to be thrown"));
    assert!(session.registry().is_empty());
}

#[test]
fn test_duplicate_signatures_across_contracts_fail_compilation() {
    let session = session_with_root("dupes");
    session.add_source("demo.Greeter", GREETER).unwrap();
    session.add_source("demo.Welcomer", "package demo;\n\npublic interface Welcomer {\n    String greet(String name);\n}\n").unwrap();
    session.add_source("demo.EnglishGreeter", ENGLISH_GREETER).unwrap();
    let welcomer = TypeMeta::interface("demo.Welcomer").method(MethodMeta::new("greet", JType::string()).param(JType::string()));
    session
        .add_wrapper(WrapperSpec::new(vec![greeter_contract(), welcomer], TypeMeta::class("demo.EnglishGreeter")))
        .unwrap();

    let error = session.compile().unwrap_err();
    assert!(error.is_compile());
    assert!(error.to_string().contains("method greet(String) is already defined in class Greeter1"));
}

#[test]
fn test_custom_fields_constructor_and_extra_members() {
    let session = session_with_root("custom");
    session.add_source("demo.Greeter", GREETER).unwrap();
    let spec = WrapperSpec::new(vec![greeter_contract()], TypeMeta::class("java.lang.Object"))
        .fields(vec![FieldSpec::new(JType::string(), "prefix")])
        .method_writer(|context| context.set_body("return prefix + suffix();"))
        .extra_writer(|writer, _| {
            writer.open("private String suffix()");
            writer.line("return \"!\";");
            writer.close();
        });
    let wrapper = session.add_wrapper(spec).unwrap();

    let classes = session.compile().unwrap();
    let adapter = classes[&wrapper].new_instance(&[Value::string("Hey").unwrap()]).unwrap();
    assert_eq!(adapter.invoke("greet", &[Value::Null]).unwrap().as_str(), Some("Hey!"));
    assert_eq!(adapter.get_field("prefix").unwrap().as_str(), Some("Hey"));
}

#[test]
fn test_invalid_specs_are_configuration_errors() {
    let session = session_with_root("invalid");
    let not_interface = WrapperSpec::new(vec![TypeMeta::class("demo.EnglishGreeter")], TypeMeta::class("demo.EnglishGreeter"));
    assert!(session.add_wrapper(not_interface).unwrap_err().is_configuration());

    let void_wrap = WrapperSpec::new(
        vec![TypeMeta::interface("java.lang.Runnable").method(MethodMeta::new("run", JType::Void))],
        TypeMeta::class("demo.Task"),
    )
    .method_writer(|context| context.wrap_return_in("demo.Holder"));
    assert!(session.add_wrapper(void_wrap).unwrap_err().is_configuration());
    assert!(session.units().is_empty());
}

#[test]
fn test_wrappers_for_digit_suffixed_hints_both_compile() {
    let names = Arc::new(NameAllocator::with_root("digits"));
    let session = CompilationSession::builder().name_allocator(names.clone()).build();
    session.add_source("demo.Greeter", GREETER).unwrap();
    let english = session.add_source("demo.EnglishGreeter", ENGLISH_GREETER).unwrap();
    let spec = |hint: &str| WrapperSpec::new(vec![greeter_contract()], TypeMeta::class("demo.EnglishGreeter")).name_hint(hint);

    let numbered = session.add_wrapper(spec("demo.Task1")).unwrap();
    for _ in 0..9 {
        names.create_class_name("demo.Filler");
    }
    let plain = session.add_wrapper(spec("demo.Task")).unwrap();
    assert_eq!(numbered.class_name(), "generated.digits.demo.Task1_1");
    assert_eq!(plain.class_name(), "generated.digits.demo.Task11");

    let classes = session.compile().unwrap();
    for unit in [&numbered, &plain] {
        let delegate = classes[&english].new_instance(&[]).unwrap();
        let adapter = classes[unit].new_instance(&[Value::Ref(delegate)]).unwrap();
        let greeting = adapter.invoke("greet", &[Value::string("Task").unwrap()]).unwrap();
        assert_eq!(greeting.as_str(), Some("Hello, Task"));
    }
}
