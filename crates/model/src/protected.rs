use std::collections::HashSet;
use uuid::Uuid;

/// Bundled default builds that the user may never remove.
///
/// Membership is a static property of the installation, populated once from
/// configuration.
#[derive(Clone, Debug, Default)]
pub struct ProtectedVersions(HashSet<Uuid>);

impl ProtectedVersions {
    pub fn new(uuids: impl IntoIterator<Item = Uuid>) -> Self {
        Self(uuids.into_iter().collect())
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.0.contains(uuid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl FromIterator<Uuid> for ProtectedVersions {
    fn from_iter<T: IntoIterator<Item = Uuid>>(iter: T) -> Self {
        Self::new(iter)
    }
}
