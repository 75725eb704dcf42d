use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An interned joint name. Equality and hashing use the integer id only, so
/// names from the same [`NameTable`] compare in O(1) and ignore ASCII case.
#[derive(Clone)]
pub struct JointName {
    id: u32,
    text: Rc<str>,
}

impl JointName {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for JointName {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JointName {}

impl Hash for JointName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointName({}#{})", self.text, self.id)
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Default)]
struct Interner {
    ids: HashMap<String, u32>,
    names: Vec<Rc<str>>,
}

/// String interning arena for joint names.
///
/// The table is an explicit context: skeletons, channel lists and motions
/// that must match names by id share one handle (cloning the handle shares
/// the table). Entries are never removed.
#[derive(Clone, Default)]
pub struct NameTable {
    inner: Rc<RefCell<Interner>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, name: &str) -> JointName {
        let key = name.to_ascii_lowercase();
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.ids.get(&key) {
            return JointName {
                id,
                text: Rc::clone(&inner.names[id as usize]),
            };
        }
        let id = inner.names.len() as u32;
        let text: Rc<str> = Rc::from(name);
        inner.names.push(Rc::clone(&text));
        inner.ids.insert(key, id);
        JointName { id, text }
    }

    pub fn lookup(&self, name: &str) -> Option<JointName> {
        let inner = self.inner.borrow();
        let id = *inner.ids.get(&name.to_ascii_lowercase())?;
        Some(JointName {
            id,
            text: Rc::clone(&inner.names[id as usize]),
        })
    }

    /// Translates a name interned elsewhere into this table, without inserting.
    pub fn translate(&self, name: &JointName, from: &NameTable) -> Option<JointName> {
        if self.same_table(from) {
            Some(name.clone())
        } else {
            self.lookup(name.as_str())
        }
    }

    pub fn same_table(&self, other: &NameTable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTable")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_ignores_case() {
        let names = NameTable::new();
        let a = names.intern("LeftElbow");
        let b = names.intern("leftelbow");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "LeftElbow");
        assert_eq!(names.len(), 1);
        assert_ne!(a, names.intern("RightElbow"));
    }

    #[test]
    fn lookup_does_not_insert() {
        let names = NameTable::new();
        assert!(names.lookup("hip").is_none());
        assert!(names.is_empty());
        names.intern("Hip");
        assert_eq!(names.lookup("HIP").map(|n| n.id()), Some(0));
    }

    #[test]
    fn translate_between_tables() {
        let a = NameTable::new();
        let b = NameTable::new();
        b.intern("spacer");
        let knee = a.intern("knee");
        assert!(b.translate(&knee, &a).is_none());
        b.intern("Knee");
        let translated = b.translate(&knee, &a).map(|n| n.id());
        assert_eq!(translated, Some(1));
        assert!(a.same_table(&a.clone()));
        assert!(!a.same_table(&b));
    }
}
