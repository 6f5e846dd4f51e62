use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Stable id of a saved position (a UUID).
    PositionId
);
string_id!(
    /// Stable id of a motion sequence (a UUID).
    SequenceId
);
string_id!(
    /// User-editable id of a reference point (six hex digits by default).
    PointId
);
string_id!(
    /// Id of a reference point group (`group_` + six hex digits).
    GroupId
);

impl PositionId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl SequenceId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl PointId {
    pub fn random() -> Self {
        Self(short_hex())
    }
}

impl GroupId {
    pub fn random() -> Self {
        Self(format!("group_{}", short_hex()))
    }
}

fn short_hex() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(6);
    hex
}

/// `[x, y, z]` arrays for `DVec3` fields.
pub(crate) mod vec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &DVec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DVec3, D::Error> {
        let [x, y, z] = <[f64; 3]>::deserialize(d)?;
        Ok(DVec3::new(x, y, z))
    }
}

/// Optional `[x, y, z]`; absent when `None`.
pub(crate) mod opt_vec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<DVec3>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|v| [v.x, v.y, v.z]).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DVec3>, D::Error> {
        let v = Option::<[f64; 3]>::deserialize(d)?;
        Ok(v.map(|[x, y, z]| DVec3::new(x, y, z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_have_expected_shape() {
        let point = PointId::random();
        assert_eq!(point.as_str().len(), 6);
        assert!(point.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        let group = GroupId::random();
        assert!(group.as_str().starts_with("group_"));
        assert_eq!(group.as_str().len(), 12);

        assert_ne!(PositionId::random(), PositionId::random());
    }
}
