//! Host collaborators: the object model and the output sink.
//!
//! The interpreter never reaches into the simulation directly.  Everything it
//! needs to know about objects, classes, interfaces, attributes and registers
//! goes through [`HostObjectModel`]; everything it prints goes through
//! [`Output`].

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::CliError;
use crate::script::value::Value;

// ── Object model ──────────────────────────────────────────────────────────────

/// A resolved host object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostObject {
    pub name: String,
    pub class: String,
}

/// Capability-set view of the host's objects.
pub trait HostObjectModel: Send + Sync {
    /// Resolve an absolute object name.
    fn lookup(&self, name: &str) -> Option<HostObject>;

    fn object_exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All object names, sorted.
    fn object_names(&self) -> Vec<String>;

    fn superclass(&self, _class: &str) -> Option<String> {
        None
    }

    /// Interfaces implemented directly by `class`.
    fn class_interfaces(&self, _class: &str) -> Vec<String> {
        Vec::new()
    }

    /// `class` followed by its superclasses, nearest first.
    fn class_chain(&self, class: &str) -> Vec<String> {
        let mut chain = vec![class.to_owned()];
        while let Some(sup) = chain.last().and_then(|c| self.superclass(c)) {
            if chain.contains(&sup) {
                break;
            }
            chain.push(sup);
        }
        chain
    }

    /// Interfaces implemented by `class` or any superclass.
    fn all_interfaces(&self, class: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for c in self.class_chain(class) {
            for iface in self.class_interfaces(&c) {
                if !out.contains(&iface) {
                    out.push(iface);
                }
            }
        }
        out
    }

    /// `true` when `name` is the object's class, a superclass, or an interface.
    fn has_capability(&self, obj: &HostObject, name: &str) -> bool {
        self.class_chain(&obj.class).iter().any(|c| c == name)
            || self.all_interfaces(&obj.class).iter().any(|i| i == name)
    }

    fn ports(&self, _obj: &HostObject) -> Vec<String> {
        Vec::new()
    }

    fn get_attr(&self, obj: &HostObject, attr: &str) -> Result<Value, CliError>;

    fn set_attr(&self, obj: &HostObject, attr: &str, value: Value) -> Result<(), CliError>;

    fn read_register(&self, name: &str) -> Result<Value, CliError> {
        Err(CliError::runtime(format!("no register '{name}'")))
    }

    fn write_register(&self, name: &str, _value: Value) -> Result<(), CliError> {
        Err(CliError::runtime(format!("no register '{name}'")))
    }
}

#[derive(Debug, Default)]
struct ObjectData {
    class: String,
    attrs: BTreeMap<String, Value>,
    ports: Vec<String>,
}

#[derive(Debug, Default)]
struct ClassData {
    superclass: Option<String>,
    interfaces: Vec<String>,
}

#[derive(Debug, Default)]
struct HostData {
    objects: BTreeMap<String, ObjectData>,
    classes: HashMap<String, ClassData>,
    registers: BTreeMap<String, Value>,
}

/// In-memory object model.
#[derive(Debug, Default)]
pub struct StaticHost {
    data: Mutex<HostData>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, HostData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_class(&self, name: &str, superclass: Option<&str>, interfaces: &[&str]) -> &Self {
        self.data().classes.insert(
            name.to_owned(),
            ClassData {
                superclass: superclass.map(str::to_owned),
                interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub fn add_object(&self, name: &str, class: &str) -> &Self {
        self.data().objects.insert(
            name.to_owned(),
            ObjectData { class: class.to_owned(), ..ObjectData::default() },
        );
        self
    }

    pub fn add_port(&self, object: &str, port: &str) -> &Self {
        if let Some(obj) = self.data().objects.get_mut(object) {
            obj.ports.push(port.to_owned());
        }
        self
    }

    pub fn set_register(&self, name: &str, value: Value) -> &Self {
        self.data().registers.insert(name.to_owned(), value);
        self
    }

    pub fn attr(&self, object: &str, attr: &str) -> Option<Value> {
        self.data().objects.get(object)?.attrs.get(attr).cloned()
    }

    pub fn init_attr(&self, object: &str, attr: &str, value: Value) -> &Self {
        if let Some(obj) = self.data().objects.get_mut(object) {
            obj.attrs.insert(attr.to_owned(), value);
        }
        self
    }
}

impl HostObjectModel for StaticHost {
    fn lookup(&self, name: &str) -> Option<HostObject> {
        let data = self.data();
        let obj = data.objects.get(name)?;
        Some(HostObject { name: name.to_owned(), class: obj.class.clone() })
    }

    fn object_names(&self) -> Vec<String> {
        self.data().objects.keys().cloned().collect()
    }

    fn superclass(&self, class: &str) -> Option<String> {
        self.data().classes.get(class)?.superclass.clone()
    }

    fn class_interfaces(&self, class: &str) -> Vec<String> {
        self.data().classes.get(class).map(|c| c.interfaces.clone()).unwrap_or_default()
    }

    fn ports(&self, obj: &HostObject) -> Vec<String> {
        self.data().objects.get(&obj.name).map(|o| o.ports.clone()).unwrap_or_default()
    }

    fn get_attr(&self, obj: &HostObject, attr: &str) -> Result<Value, CliError> {
        self.data()
            .objects
            .get(&obj.name)
            .and_then(|o| o.attrs.get(attr).cloned())
            .ok_or_else(|| CliError::runtime(format!("'{}' has no attribute '{attr}'", obj.name)))
    }

    fn set_attr(&self, obj: &HostObject, attr: &str, value: Value) -> Result<(), CliError> {
        let mut data = self.data();
        let o = data
            .objects
            .get_mut(&obj.name)
            .ok_or_else(|| CliError::runtime(format!("no object '{}'", obj.name)))?;
        o.attrs.insert(attr.to_owned(), value);
        Ok(())
    }

    fn read_register(&self, name: &str) -> Result<Value, CliError> {
        self.data()
            .registers
            .get(name)
            .cloned()
            .ok_or_else(|| CliError::runtime(format!("no register '{name}'")))
    }

    fn write_register(&self, name: &str, value: Value) -> Result<(), CliError> {
        let mut data = self.data();
        match data.registers.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CliError::runtime(format!("no register '{name}'"))),
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Sink for everything the interpreter prints.
pub trait Output: Send {
    /// Print one line of text.
    fn print(&mut self, text: &str);
}

#[derive(Debug, Default)]
pub struct StdoutOutput;

impl Output for StdoutOutput {
    fn print(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout is not worth failing a command over.
        let _ = writeln!(out, "{text}");
    }
}

/// Collects output in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferOutput(Arc<Mutex<String>>);

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Output for BufferOutput {
    fn print(&mut self, text: &str) {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        buf.push_str(text);
        buf.push('\n');
    }
}

/// Remove the `<b>`, `<i>`, `<tt>` and `<var>` markup tags.
pub fn strip_markup(text: &str) -> String {
    const TAGS: &[&str] = &["<b>", "</b>", "<i>", "</i>", "<tt>", "</tt>", "<var>", "</var>"];
    let mut out = text.to_owned();
    for tag in TAGS {
        out = out.replace(tag, "");
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> StaticHost {
        let h = StaticHost::new();
        h.add_class("device", None, &["io"])
            .add_class("processor", Some("device"), &["int_register", "processor_info"])
            .add_object("cpu0", "processor")
            .add_port("cpu0", "RESET")
            .init_attr("cpu0", "freq", Value::Int(100));
        h
    }

    #[test]
    fn capabilities_follow_superclasses() {
        let h = host();
        let cpu = h.lookup("cpu0").unwrap();
        assert!(h.has_capability(&cpu, "processor"));
        assert!(h.has_capability(&cpu, "device"));
        assert!(h.has_capability(&cpu, "io"));
        assert!(!h.has_capability(&cpu, "memory"));
        assert_eq!(h.class_chain("processor"), vec!["processor", "device"]);
    }

    #[test]
    fn attributes_round_trip() {
        let h = host();
        let cpu = h.lookup("cpu0").unwrap();
        assert_eq!(h.get_attr(&cpu, "freq").unwrap(), Value::Int(100));
        h.set_attr(&cpu, "freq", Value::Int(200)).unwrap();
        assert_eq!(h.attr("cpu0", "freq"), Some(Value::Int(200)));
        assert!(h.get_attr(&cpu, "nope").is_err());
    }

    #[test]
    fn registers() {
        let h = host();
        assert!(h.read_register("pc").is_err());
        h.set_register("pc", Value::Int(4));
        h.write_register("pc", Value::Int(8)).unwrap();
        assert_eq!(h.read_register("pc").unwrap(), Value::Int(8));
    }

    #[test]
    fn buffer_output_is_shared() {
        let buf = BufferOutput::new();
        let mut sink = buf.clone();
        sink.print("hello");
        assert_eq!(buf.contents(), "hello\n");
    }

    #[test]
    fn markup_is_stripped() {
        assert_eq!(strip_markup("use <b>foo</b> <var>x</var>"), "use foo x");
    }
}
