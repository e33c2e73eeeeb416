//! The customer a staff member is currently acting for. Independent of the
//! cart's acting-user id; callers keep the two in sync when switching.

use parking_lot::RwLock;

use crate::model::User;

#[derive(Default)]
pub struct CustomerSelection {
    inner: RwLock<Option<User>>,
}

impl CustomerSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, customer: User) {
        *self.inner.write() = Some(customer);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn selected(&self) -> Option<User> {
        self.inner.read().clone()
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.inner.read().as_ref().map(|customer| customer.id)
    }
}
