//! Adapter classes that implement contract interfaces over a delegate
//!
//! A wrapper implements every contract type. Each abstract contract method
//! either forwards to the delegate expression or runs a body supplied by the
//! method writer. Default and static interface methods are inherited and
//! never generated.

use std::fmt;

use super::naming::{GeneratedClassName, NameAllocator};
use super::source::{source_type_list, FieldSpec, SourceWriter};
use crate::codegen::descriptor::JType;
use crate::common::error::{Error, Result};
use crate::rt::reflect::{MethodMeta, TypeMeta};

/// Field holding the delegate when no custom fields are given
pub const DELEGATE_FIELD: &str = "delegate";

/// What writers get to see of the class being generated
#[derive(Debug)]
pub struct WrapperClass<'a> {
    pub name: &'a GeneratedClassName,
    pub contracts: &'a [TypeMeta],
    pub delegate_type: &'a TypeMeta,
    pub fields: &'a [FieldSpec],
}

pub type ConstructorWriter = Box<dyn Fn(&mut SourceWriter, &WrapperClass<'_>)>;
pub type MethodWriter = Box<dyn Fn(&mut MethodAdapterContext<'_>)>;
pub type ExtraWriter = Box<dyn Fn(&mut SourceWriter, &WrapperClass<'_>)>;

/// One contract method while its adapter is being written
#[derive(Debug)]
pub struct MethodAdapterContext<'a> {
    contract: &'a TypeMeta,
    method: &'a MethodMeta,
    delegate_expression: &'a str,
    body: Option<String>,
    wrap_return: Option<String>,
}

impl<'a> MethodAdapterContext<'a> {
    fn new(contract: &'a TypeMeta, method: &'a MethodMeta, delegate_expression: &'a str) -> Self {
        Self { contract, method, delegate_expression, body: None, wrap_return: None }
    }

    pub fn contract(&self) -> &TypeMeta {
        self.contract
    }

    pub fn method(&self) -> &MethodMeta {
        self.method
    }

    pub fn delegate_expression(&self) -> &str {
        self.delegate_expression
    }

    /// `arg0`, `arg1`, ... in parameter order
    pub fn parameter_names(&self) -> Vec<String> {
        (0..self.method.parameter_types.len()).map(|i| format!("arg{}", i)).collect()
    }

    /// Replace the delegating call with `body`, the statements between the braces
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Wrap the delegate's return value in `new <class>(...)`
    pub fn wrap_return_in(&mut self, class_name: impl Into<String>) {
        self.wrap_return = Some(class_name.into());
    }

    pub fn wrap_return(&self) -> Option<&str> {
        self.wrap_return.as_deref()
    }

    /// `delegate.greet(arg0)`, wrapped when requested
    pub fn delegating_call(&self) -> String {
        let call = format!("{}.{}({})", self.delegate_expression, self.method.name, self.parameter_names().join(", "));
        match &self.wrap_return {
            Some(class) => format!("new {}({})", class.replace('$', "."), call),
            None => call,
        }
    }
}

/// Everything needed to synthesize one wrapper class
pub struct WrapperSpec {
    contracts: Vec<TypeMeta>,
    delegate_type: TypeMeta,
    delegate_expression: Option<String>,
    name_hint: Option<String>,
    fields: Option<Vec<FieldSpec>>,
    constructor_writer: Option<ConstructorWriter>,
    method_writer: Option<MethodWriter>,
    extra_writers: Vec<ExtraWriter>,
}

impl fmt::Debug for WrapperSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperSpec")
            .field("contracts", &self.contracts.iter().map(|c| &c.name).collect::<Vec<_>>())
            .field("delegate_type", &self.delegate_type.name)
            .field("delegate_expression", &self.delegate_expression)
            .field("name_hint", &self.name_hint)
            .field("fields", &self.fields)
            .field("custom_constructor", &self.constructor_writer.is_some())
            .field("method_writer", &self.method_writer.is_some())
            .field("extra_writers", &self.extra_writers.len())
            .finish()
    }
}

impl WrapperSpec {
    pub fn new(contracts: Vec<TypeMeta>, delegate_type: TypeMeta) -> Self {
        Self {
            contracts,
            delegate_type,
            delegate_expression: None,
            name_hint: None,
            fields: None,
            constructor_writer: None,
            method_writer: None,
            extra_writers: Vec::new(),
        }
    }

    /// Expression the default method bodies call into, `delegate` unless set
    pub fn delegate_expression(mut self, expression: impl Into<String>) -> Self {
        self.delegate_expression = Some(expression.into());
        self
    }

    /// Hint for the class name; the first contract's name otherwise
    pub fn name_hint(mut self, hint: impl Into<String>) -> Self {
        self.name_hint = Some(hint.into());
        self
    }

    /// Constructor fields, replacing the single `delegate` field
    pub fn fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn constructor_writer(mut self, writer: impl Fn(&mut SourceWriter, &WrapperClass<'_>) + 'static) -> Self {
        self.constructor_writer = Some(Box::new(writer));
        self
    }

    pub fn method_writer(mut self, writer: impl Fn(&mut MethodAdapterContext<'_>) + 'static) -> Self {
        self.method_writer = Some(Box::new(writer));
        self
    }

    pub fn extra_writer(mut self, writer: impl Fn(&mut SourceWriter, &WrapperClass<'_>) + 'static) -> Self {
        self.extra_writers.push(Box::new(writer));
        self
    }

    pub fn contracts(&self) -> &[TypeMeta] {
        &self.contracts
    }

    fn validate(&self) -> Result<()> {
        if self.contracts.is_empty() {
            return Err(Error::configuration("a wrapper needs at least one contract type"));
        }
        if let Some(contract) = self.contracts.iter().find(|c| !c.is_interface) {
            return Err(Error::configuration(format!("contract type {} is not an interface", contract.name)));
        }
        Ok(())
    }
}

/// A synthesized class ready to be added to a session
#[derive(Debug, Clone)]
pub struct SynthesizedClass {
    pub name: GeneratedClassName,
    pub source: String,
}

/// Generate the wrapper source for `spec`
pub fn synthesize(spec: &WrapperSpec, names: &NameAllocator) -> Result<SynthesizedClass> {
    spec.validate()?;
    let hint = spec.name_hint.clone().unwrap_or_else(|| spec.contracts[0].name.clone());
    let name = names.create_class_name(&hint);
    let fields = spec
        .fields
        .clone()
        .unwrap_or_else(|| vec![FieldSpec::new(JType::class(spec.delegate_type.name.clone()), DELEGATE_FIELD)]);
    let class = WrapperClass { name: &name, contracts: &spec.contracts, delegate_type: &spec.delegate_type, fields: &fields };
    let delegate_expression = spec.delegate_expression.as_deref().unwrap_or(DELEGATE_FIELD);

    let mut writer = SourceWriter::new();
    writer.line(&format!("package {};", name.package_name()));
    writer.blank();
    writer.line("@SuppressWarnings(\"all\")");
    let implemented: Vec<String> = spec.contracts.iter().map(TypeMeta::source_name).collect();
    writer.open(&format!("public class {} implements {}", name.simple_name(), implemented.join(", ")));

    match &spec.constructor_writer {
        Some(custom) => custom(&mut writer, &class),
        None => write_default_constructor(&mut writer, &class),
    }

    let mut generated = 0;
    for contract in &spec.contracts {
        for method in contract.methods.iter().filter(|m| m.needs_adapter()) {
            let mut context = MethodAdapterContext::new(contract, method, delegate_expression);
            if let Some(method_writer) = &spec.method_writer {
                method_writer(&mut context);
            }
            check_adapter(spec, &context)?;
            writer.blank();
            write_method(&mut writer, &context);
            generated += 1;
        }
    }

    for extra in &spec.extra_writers {
        writer.blank();
        extra(&mut writer, &class);
    }
    writer.close();

    log::debug!("synthesized {} with {} adapter method(s)", name, generated);
    Ok(SynthesizedClass { name, source: writer.finish() })
}

fn write_default_constructor(writer: &mut SourceWriter, class: &WrapperClass<'_>) {
    for field in class.fields {
        writer.line(&format!("private final {} {};", field.ty.source_name(), field.name));
    }
    writer.blank();
    let params: Vec<String> = class.fields.iter().map(|f| format!("{} {}", f.ty.source_name(), f.name)).collect();
    writer.open(&format!("public {}({})", class.name.simple_name(), params.join(", ")));
    for field in class.fields {
        writer.line(&format!("this.{0} = {0};", field.name));
    }
    writer.close();
}

/// Reject adapters that could never compile before the compiler sees them
fn check_adapter(spec: &WrapperSpec, context: &MethodAdapterContext<'_>) -> Result<()> {
    let method = context.method();
    if context.wrap_return().is_some() && method.is_void() {
        return Err(Error::configuration(format!(
            "cannot wrap the return value of void method {}.{}",
            context.contract().source_name(),
            method.signature()
        )));
    }
    let delegates_by_default = context.body().is_none() && spec.delegate_expression.is_none();
    if delegates_by_default && !spec.delegate_type.methods.is_empty() {
        let satisfied = spec
            .delegate_type
            .methods_named(&method.name)
            .any(|candidate| candidate.parameter_types == method.parameter_types && !candidate.is_static);
        if !satisfied {
            return Err(Error::configuration(format!(
                "delegate type {} has no method {} for {}",
                spec.delegate_type.source_name(),
                method.signature(),
                context.contract().source_name()
            )));
        }
    }
    Ok(())
}

fn write_method(writer: &mut SourceWriter, context: &MethodAdapterContext<'_>) {
    let method = context.method();
    let params: Vec<String> = method
        .parameter_types
        .iter()
        .zip(context.parameter_names())
        .map(|(ty, name)| format!("{} {}", ty.source_name(), name))
        .collect();
    let mut header = format!("public {} {}({})", method.return_type.source_name(), method.name, params.join(", "));
    if !method.exception_types.is_empty() {
        let thrown: Vec<JType> = method.exception_types.iter().map(|e| JType::class(e.clone())).collect();
        header.push_str(" throws ");
        header.push_str(&source_type_list(&thrown));
    }
    writer.open(&header);
    match context.body() {
        Some(body) => writer.lines(body),
        None if method.is_void() => writer.line(&format!("{};", context.delegating_call())),
        None => writer.line(&format!("return {};", context.delegating_call())),
    }
    writer.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::reflect::MethodMeta;

    fn greeter() -> TypeMeta {
        TypeMeta::interface("demo.Greeter").method(MethodMeta::new("greet", JType::string()).param(JType::string()))
    }

    #[test]
    fn test_default_delegation_source() {
        let names = NameAllocator::with_root("unit");
        let spec = WrapperSpec::new(vec![greeter()], TypeMeta::class("demo.Impl"));
        let class = synthesize(&spec, &names).unwrap();
        assert_eq!(class.name.fully_qualified_name(), "generated.unit.demo.Greeter1");
        let expected = "\
package generated.unit.demo;

@SuppressWarnings(\"all\")
public class Greeter1 implements demo.Greeter {
    private final demo.Impl delegate;

    public Greeter1(demo.Impl delegate) {
        this.delegate = delegate;
    }

    public java.lang.String greet(java.lang.String arg0) {
        return delegate.greet(arg0);
    }
}
";
        assert_eq!(class.source, expected);
    }

    #[test]
    fn test_void_throws_and_wrap() {
        let names = NameAllocator::new();
        let contract = TypeMeta::interface("demo.Store")
            .method(MethodMeta::new("save", JType::Void).param(JType::Int).throws("java.io.IOException"))
            .method(MethodMeta::new("load", JType::object()))
            .method(MethodMeta::new("helper", JType::Void).into_default())
            .method(MethodMeta::new("create", JType::Void).into_static());
        let spec = WrapperSpec::new(vec![contract], TypeMeta::class("demo.Backend")).method_writer(|context| {
            if context.method().name == "load" {
                context.wrap_return_in("demo.Holder");
            }
        });
        let source = synthesize(&spec, &names).unwrap().source;
        assert!(source.contains("public void save(int arg0) throws java.io.IOException {\n        delegate.save(arg0);\n"));
        assert!(source.contains("return new demo.Holder(delegate.load());"));
        assert!(!source.contains("helper"));
        assert!(!source.contains("create"));
    }

    #[test]
    fn test_override_body_and_extra_writer() {
        let names = NameAllocator::new();
        let spec = WrapperSpec::new(vec![greeter()], TypeMeta::class("demo.Impl"))
            .method_writer(|context| context.set_body("return \"fixed\";"))
            .extra_writer(|writer, class| writer.line(&format!("// {} fields", class.fields.len())));
        let source = synthesize(&spec, &names).unwrap().source;
        assert!(source.contains("return \"fixed\";"));
        assert!(!source.contains("delegate.greet"));
        assert!(source.contains("    // 1 fields\n}\n"));
    }

    #[test]
    fn test_configuration_errors() {
        let names = NameAllocator::new();
        let empty = WrapperSpec::new(Vec::new(), TypeMeta::class("demo.Impl"));
        assert!(synthesize(&empty, &names).unwrap_err().is_configuration());

        let not_interface = WrapperSpec::new(vec![TypeMeta::class("demo.Base")], TypeMeta::class("demo.Impl"));
        assert!(synthesize(&not_interface, &names).unwrap_err().is_configuration());

        let void_wrap = WrapperSpec::new(
            vec![TypeMeta::interface("demo.Task").method(MethodMeta::new("run", JType::Void))],
            TypeMeta::class("demo.Impl"),
        )
        .method_writer(|context| context.wrap_return_in("demo.Holder"));
        assert!(synthesize(&void_wrap, &names).unwrap_err().is_configuration());

        let unsatisfied = WrapperSpec::new(
            vec![greeter()],
            TypeMeta::class("demo.Impl").method(MethodMeta::new("greet", JType::string()).into_concrete()),
        );
        let error = synthesize(&unsatisfied, &names).unwrap_err();
        assert!(error.to_string().contains("has no method greet(java.lang.String)"));
    }
}
