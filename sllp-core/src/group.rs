//! Groups: ordered sets of variables read and written as one unit.

use crate::variable::{VarId, Variable};

/// Protocol id of a group.
pub type GroupId = u8;

/// Group holding every registered variable.
pub const GROUP_ALL_ID: GroupId = 0;
/// Group holding every read-only variable.
pub const GROUP_READ_ID: GroupId = 1;
/// Group holding every writable variable.
pub const GROUP_WRITE_ID: GroupId = 2;
/// Number of groups that always exist.
pub const STANDARD_GROUP_COUNT: usize = 3;

/// A group of variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    writable: bool,
    data_size: usize,
    members: Vec<VarId>,
}

impl Group {
    pub(crate) fn new(id: GroupId, writable: bool) -> Self {
        Self {
            id,
            writable,
            data_size: 0,
            members: Vec::new(),
        }
    }

    /// Appends `var`, keeping `data_size` in step.
    pub(crate) fn push(&mut self, var: &Variable) {
        debug_assert!(!self.contains(var.id()), "variable {} already in group", var.id());
        self.members.push(var.id());
        self.data_size += var.size();
    }

    pub(crate) fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Sum of the member sizes in bytes.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Member ids in protocol order.
    pub fn members(&self) -> &[VarId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: VarId) -> bool {
        self.members.contains(&id)
    }

    /// Whether this is one of ALL, READ or WRITE.
    pub fn is_standard(&self) -> bool {
        (self.id as usize) < STANDARD_GROUP_COUNT
    }
}
