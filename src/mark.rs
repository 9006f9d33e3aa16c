use crate::de::{self, JsonError};
use crate::schema::{Attrs, MarkType, Schema};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A mark is a piece of information that can be attached to a node, such as
/// it being emphasized, in code font, or a link. It has a type and optionally
/// a set of attributes that provide further information (such as the target of
/// the link). Marks are created through a `Schema`, which controls which marks
/// exist and which attributes they have.
#[derive(Clone)]
pub struct Mark {
    inner: Arc<MarkData>,
}

struct MarkData {
    r#type: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub(crate) fn new(r#type: MarkType, attrs: Attrs) -> Self {
        Mark {
            inner: Arc::new(MarkData { r#type, attrs }),
        }
    }

    /// The type of this mark.
    pub fn r#type(&self) -> &MarkType {
        &self.inner.r#type
    }

    /// The attributes associated with this mark.
    pub fn attrs(&self) -> &Attrs {
        &self.inner.attrs
    }

    /// Given a set of marks, create a new set which contains this one as
    /// well, in the right position. If this mark is already in the set, the
    /// set itself is returned. If any marks that are set to be
    /// [exclusive](MarkType::excludes) with this mark are present, those are
    /// replaced by this one.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut copy: Option<Vec<Mark>> = None;
        let mut placed = false;
        for (i, other) in set.iter().enumerate() {
            if self == other {
                return set.to_vec();
            }
            if self.r#type().excludes(other.r#type()) {
                copy.get_or_insert_with(|| set[..i].to_vec());
            } else if other.r#type().excludes(self.r#type()) {
                return set.to_vec();
            } else {
                if !placed && other.r#type().rank() > self.r#type().rank() {
                    let target = copy.get_or_insert_with(|| set[..i].to_vec());
                    target.push(self.clone());
                    placed = true;
                }
                if let Some(target) = &mut copy {
                    target.push(other.clone());
                }
            }
        }
        let mut result = copy.unwrap_or_else(|| set.to_vec());
        if !placed {
            result.push(self.clone());
        }
        result
    }

    /// Remove this mark from the given set, returning a new set. If this mark
    /// is not in the set, the set itself is returned.
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        match set.iter().position(|m| m == self) {
            Some(i) => {
                let mut copy = set.to_vec();
                copy.remove(i);
                copy
            }
            None => set.to_vec(),
        }
    }

    /// Test whether this mark is in the given set of marks.
    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }

    /// Test whether two sets of marks are identical.
    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
        a == b
    }

    /// Create a properly sorted mark set from an unordered collection of
    /// marks.
    pub fn set_from(marks: &[Mark]) -> Vec<Mark> {
        if marks.len() < 2 {
            return marks.to_vec();
        }
        let mut copy = marks.to_vec();
        copy.sort_by_key(|m| m.r#type().rank());
        copy
    }

    /// Deserialize a mark from its JSON representation. Names that the given
    /// schema does not know produce an error.
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Mark, JsonError> {
        let obj = de::expect_object(value, "mark")?;
        let name = de::expect_str(de::require(obj, "type", "mark")?, "mark type")?;
        let r#type = schema
            .mark_type(name)
            .ok_or_else(|| JsonError::UnknownMarkType {
                name: name.to_owned(),
            })?;
        let attrs = match obj.get("attrs") {
            Some(v) => Some(de::expect_attrs(v)?),
            None => None,
        };
        r#type
            .create(attrs.as_ref())
            .map_err(|e| JsonError::Attrs(e.to_string()))
    }
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.r#type() == other.r#type() && self.attrs() == other.attrs())
    }
}

impl Eq for Mark {}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs().is_empty() {
            write!(f, "{}", self.r#type().name())
        } else {
            write!(f, "{}(", self.r#type().name())?;
            for (i, (key, value)) in self.attrs().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            f.write_str(")")
        }
    }
}

impl Serialize for Mark {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let len = if self.attrs().is_empty() { 1 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", self.r#type().name())?;
        if !self.attrs().is_empty() {
            map.serialize_entry("attrs", self.attrs())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::Mark;
    use crate::basic::helper::schema;
    use crate::schema::Attrs;
    use serde_json::json;

    fn em() -> Mark {
        schema().mark("em", None).unwrap()
    }

    fn strong() -> Mark {
        schema().mark("strong", None).unwrap()
    }

    fn code() -> Mark {
        schema().mark("code", None).unwrap()
    }

    fn link(href: &str) -> Mark {
        let mut attrs = Attrs::new();
        attrs.insert("href".to_owned(), json!(href));
        schema().mark("link", Some(attrs)).unwrap()
    }

    #[test]
    fn orders_by_rank_when_adding() {
        assert_eq!(strong().add_to_set(&[em()]), vec![em(), strong()]);
        assert_eq!(em().add_to_set(&[strong()]), vec![em(), strong()]);
        assert_eq!(
            code().add_to_set(&[em(), strong(), link("http://x")]),
            vec![em(), strong(), link("http://x"), code()]
        );
    }

    #[test]
    fn same_type_replaces_by_default() {
        assert_eq!(
            link("http://b").add_to_set(&[em(), link("http://a")]),
            vec![em(), link("http://b")]
        );
    }

    #[test]
    fn add_is_idempotent() {
        let set = strong().add_to_set(&[em()]);
        assert_eq!(strong().add_to_set(&set), set);
    }

    #[test]
    fn remove_undoes_add() {
        let set = vec![em(), code()];
        let added = strong().add_to_set(&set);
        assert_eq!(strong().remove_from_set(&added), set);
        assert_eq!(strong().remove_from_set(&set), set);
    }

    #[test]
    fn membership() {
        assert!(em().is_in_set(&[em(), strong()]));
        assert!(!code().is_in_set(&[em(), strong()]));
        assert!(Mark::same_set(&[em(), strong()], &[em(), strong()]));
        assert!(!Mark::same_set(&[em()], &[strong()]));
    }

    #[test]
    fn set_from_sorts() {
        assert_eq!(Mark::set_from(&[code(), em()]), vec![em(), code()]);
    }

    #[test]
    fn json_round_trip() {
        let mark = link("http://example.com");
        let encoded = serde_json::to_value(&mark).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "link", "attrs": {"href": "http://example.com", "title": ""}})
        );
        assert_eq!(Mark::from_json(schema(), &encoded).unwrap(), mark);
    }

    #[test]
    fn json_rejects_unknown_type() {
        assert!(Mark::from_json(schema(), &json!({"type": "wavy"})).is_err());
    }
}
