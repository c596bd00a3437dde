//! Registry - variable, group and curve tables.

use crate::curve::{Curve, CurveDef, CurveId};
use crate::error::CoreError;
use crate::group::{
    Group, GroupId, GROUP_ALL_ID, GROUP_READ_ID, GROUP_WRITE_ID, STANDARD_GROUP_COUNT,
};
use crate::variable::{VarId, Variable, VariableDef};

/// Maximum number of variables.
pub const MAX_VARIABLES: usize = 128;

/// Maximum number of groups, standard groups included.
pub const MAX_GROUPS: usize = 128;

/// Maximum number of curves.
pub const MAX_CURVES: usize = 128;

/// Tables of everything exposed over the protocol.
///
/// Ids are indices: variables, groups and curves are numbered densely from
/// zero in registration order. The ALL, READ and WRITE groups always occupy
/// ids 0 to 2 and track every variable registration.
#[derive(Debug)]
pub struct Registry {
    variables: Vec<Variable>,
    groups: Vec<Group>,
    curves: Vec<Curve>,
}

impl Registry {
    /// Creates an empty registry holding only the standard groups.
    pub fn new() -> Self {
        let groups = vec![
            Group::new(GROUP_ALL_ID, false),
            Group::new(GROUP_READ_ID, false),
            Group::new(GROUP_WRITE_ID, true),
        ];
        Self {
            variables: Vec::new(),
            groups,
            curves: Vec::new(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a variable, returning its id.
    pub fn register_variable(&mut self, def: VariableDef) -> Result<VarId, CoreError> {
        let id = self.variables.len();
        let var = Variable::from_def(id as VarId, def)?;

        if id == MAX_VARIABLES {
            return Err(CoreError::TableFull {
                table: "variable",
                max: MAX_VARIABLES,
            });
        }

        self.groups[GROUP_ALL_ID as usize].push(&var);
        let partition = if var.is_writable() {
            GROUP_WRITE_ID
        } else {
            GROUP_READ_ID
        };
        self.groups[partition as usize].push(&var);

        tracing::debug!(
            "Registered variable {} ({} bytes, {})",
            id,
            var.size(),
            if var.is_writable() { "writable" } else { "read-only" }
        );

        self.variables.push(var);
        Ok(id as VarId)
    }

    /// Registers a curve, returning its id.
    pub fn register_curve(&mut self, def: CurveDef) -> Result<CurveId, CoreError> {
        let id = self.curves.len();
        let curve = Curve::from_def(id as CurveId, def)?;

        if id == MAX_CURVES {
            return Err(CoreError::TableFull {
                table: "curve",
                max: MAX_CURVES,
            });
        }

        tracing::debug!(
            "Registered curve {} ({} blocks, {})",
            id,
            curve.block_count(),
            if curve.is_writable() { "writable" } else { "read-only" }
        );

        self.curves.push(curve);
        Ok(id as CurveId)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id as usize)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id as usize)
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id as usize)
    }

    pub fn curve_mut(&mut self, id: CurveId) -> Option<&mut Curve> {
        self.curves.get_mut(id as usize)
    }

    /// Resolves a group's members in group order.
    pub fn members<'a>(&'a self, group: &'a Group) -> impl Iterator<Item = &'a Variable> + 'a {
        // Groups only ever reference registered variables
        group
            .members()
            .iter()
            .map(move |&id| &self.variables[id as usize])
    }

    // =========================================================================
    // Group management
    // =========================================================================

    /// Creates a user group from `members`, in the given order.
    ///
    /// The group is writable only if every member is. On any error the group
    /// table is left untouched.
    pub fn create_group(&mut self, members: &[VarId]) -> Result<&Group, CoreError> {
        if members.is_empty() || members.len() > self.variables.len() {
            return Err(CoreError::OutOfRange {
                field: "group member count",
                value: members.len(),
                min: 1,
                max: self.variables.len(),
            });
        }

        if self.groups.len() == MAX_GROUPS {
            return Err(CoreError::TableFull {
                table: "group",
                max: MAX_GROUPS,
            });
        }

        let mut group = Group::new(self.groups.len() as GroupId, true);
        let mut writable = true;
        for &id in members {
            let var = self
                .variable(id)
                .ok_or(CoreError::VariableNotFound { id })?;
            if group.contains(id) {
                return Err(CoreError::DuplicateMember { id });
            }
            writable &= var.is_writable();
            group.push(var);
        }
        group.set_writable(writable);

        tracing::debug!(
            "Created group {} with {} members ({} bytes)",
            group.id(),
            group.len(),
            group.data_size()
        );

        self.groups.push(group);
        Ok(&self.groups[self.groups.len() - 1])
    }

    /// Drops every user group, keeping ALL, READ and WRITE.
    ///
    /// Returns the number of groups removed.
    pub fn remove_user_groups(&mut self) -> usize {
        let before = self.groups.len();
        self.groups.retain(Group::is_standard);
        before - self.groups.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::MemoryCurve;
    use crate::variable::VarData;
    use proptest::prelude::*;

    fn registry_with(vars: &[(usize, bool)]) -> Registry {
        let mut registry = Registry::new();
        for &(size, writable) in vars {
            let data = VarData::zeroed(size);
            let def = if writable {
                VariableDef::writable(data)
            } else {
                VariableDef::read_only(data)
            };
            registry.register_variable(def).unwrap();
        }
        registry
    }

    fn group_ids(registry: &Registry, id: GroupId) -> Vec<VarId> {
        registry.group(id).unwrap().members().to_vec()
    }

    #[test]
    fn test_new_registry_has_standard_groups() {
        let registry = Registry::new();
        assert_eq!(registry.groups().len(), STANDARD_GROUP_COUNT);
        assert!(registry.variables().is_empty());
        assert!(registry.curves().is_empty());

        assert!(!registry.group(GROUP_ALL_ID).unwrap().is_writable());
        assert!(!registry.group(GROUP_READ_ID).unwrap().is_writable());
        assert!(registry.group(GROUP_WRITE_ID).unwrap().is_writable());
        assert!(registry.groups().iter().all(|g| g.is_empty()));
    }

    #[test]
    fn test_register_variable_updates_standard_groups() {
        let registry = registry_with(&[(1, false), (2, true), (4, false)]);

        assert_eq!(group_ids(&registry, GROUP_ALL_ID), vec![0, 1, 2]);
        assert_eq!(group_ids(&registry, GROUP_READ_ID), vec![0, 2]);
        assert_eq!(group_ids(&registry, GROUP_WRITE_ID), vec![1]);

        assert_eq!(registry.group(GROUP_ALL_ID).unwrap().data_size(), 7);
        assert_eq!(registry.group(GROUP_READ_ID).unwrap().data_size(), 5);
        assert_eq!(registry.group(GROUP_WRITE_ID).unwrap().data_size(), 2);
    }

    #[test]
    fn test_register_variable_rejects_bad_size() {
        let mut registry = Registry::new();
        let result = registry.register_variable(VariableDef::read_only(VarData::zeroed(128)));
        assert!(matches!(result, Err(CoreError::OutOfRange { .. })));

        // Nothing was added anywhere
        assert!(registry.variables().is_empty());
        assert!(registry.group(GROUP_ALL_ID).unwrap().is_empty());
    }

    #[test]
    fn test_variable_table_full() {
        let mut registry = registry_with(&[(1, true); MAX_VARIABLES]);
        assert_eq!(registry.variables().len(), MAX_VARIABLES);
        assert_eq!(registry.variables()[127].id(), 127);

        let result = registry.register_variable(VariableDef::writable(VarData::zeroed(1)));
        assert!(matches!(result, Err(CoreError::TableFull { .. })));
        assert_eq!(registry.group(GROUP_ALL_ID).unwrap().len(), MAX_VARIABLES);
    }

    #[test]
    fn test_register_curve() {
        let mut registry = Registry::new();
        let a = MemoryCurve::new(0);
        let b = MemoryCurve::new(7);

        assert_eq!(registry.register_curve(a.read_only_def()).unwrap(), 0);
        assert_eq!(registry.register_curve(b.writable_def()).unwrap(), 1);

        assert_eq!(registry.curve(1).unwrap().nblocks(), 7);
        assert!(registry.curve(2).is_none());
    }

    #[test]
    fn test_register_curve_rejects_missing_reader() {
        let mut registry = Registry::new();
        let result = registry.register_curve(CurveDef::default());
        assert!(matches!(result, Err(CoreError::InvalidParam { .. })));
        assert!(registry.curves().is_empty());
    }

    #[test]
    fn test_curve_table_full() {
        let mut registry = Registry::new();
        let storage = MemoryCurve::new(0);
        for _ in 0..MAX_CURVES {
            registry.register_curve(storage.read_only_def()).unwrap();
        }
        let result = registry.register_curve(storage.read_only_def());
        assert!(matches!(result, Err(CoreError::TableFull { .. })));
    }

    #[test]
    fn test_create_group() {
        let mut registry = registry_with(&[(1, true), (2, true), (4, false)]);

        let group = registry.create_group(&[2, 0]).unwrap();
        assert_eq!(group.id(), 3);
        assert_eq!(group.members(), &[2, 0]);
        assert_eq!(group.data_size(), 5);
        assert!(!group.is_writable());

        let group = registry.create_group(&[1, 0]).unwrap();
        assert_eq!(group.id(), 4);
        assert!(group.is_writable());
        assert!(!group.is_standard());
    }

    #[test]
    fn test_members_in_group_order() {
        let mut registry = registry_with(&[(1, true), (2, true), (3, true)]);
        let id = registry.create_group(&[2, 0, 1]).unwrap().id();

        let group = registry.group(id).unwrap();
        let sizes: Vec<usize> = registry.members(group).map(|v| v.size()).collect();
        assert_eq!(sizes, vec![3, 1, 2]);
    }

    #[test]
    fn test_create_group_unknown_variable() {
        let mut registry = registry_with(&[(1, true), (1, true)]);
        let result = registry.create_group(&[0, 5]);
        assert!(matches!(result, Err(CoreError::VariableNotFound { id: 5 })));
        assert_eq!(registry.groups().len(), STANDARD_GROUP_COUNT);
    }

    #[test]
    fn test_create_group_duplicate_member() {
        let mut registry = registry_with(&[(1, true), (1, true)]);
        let result = registry.create_group(&[1, 1]);
        assert!(matches!(result, Err(CoreError::DuplicateMember { id: 1 })));
        assert_eq!(registry.groups().len(), STANDARD_GROUP_COUNT);
    }

    #[test]
    fn test_create_group_member_count_limits() {
        let mut registry = registry_with(&[(1, true), (1, true)]);
        assert!(matches!(
            registry.create_group(&[]),
            Err(CoreError::OutOfRange { .. })
        ));
        assert!(matches!(
            registry.create_group(&[0, 1, 0]),
            Err(CoreError::OutOfRange { .. })
        ));
        assert!(registry.create_group(&[0, 1]).is_ok());
    }

    #[test]
    fn test_group_table_full() {
        let mut registry = registry_with(&[(1, true)]);
        for _ in STANDARD_GROUP_COUNT..MAX_GROUPS {
            registry.create_group(&[0]).unwrap();
        }
        assert_eq!(registry.groups().len(), MAX_GROUPS);
        assert!(matches!(
            registry.create_group(&[0]),
            Err(CoreError::TableFull { .. })
        ));
    }

    #[test]
    fn test_remove_user_groups() {
        let mut registry = registry_with(&[(1, true), (1, false)]);
        registry.create_group(&[0]).unwrap();
        registry.create_group(&[1, 0]).unwrap();

        assert_eq!(registry.remove_user_groups(), 2);
        assert_eq!(registry.groups().len(), STANDARD_GROUP_COUNT);
        assert_eq!(group_ids(&registry, GROUP_ALL_ID), vec![0, 1]);

        // Ids restart after the standard groups
        assert_eq!(registry.create_group(&[1]).unwrap().id(), 3);
        assert_eq!(registry.remove_user_groups(), 1);
        assert_eq!(registry.remove_user_groups(), 0);
    }

    proptest! {
        #[test]
        fn prop_standard_groups_partition_variables(
            vars in prop::collection::vec((1usize..=127, any::<bool>()), 0..64)
        ) {
            let registry = registry_with(&vars);

            // Dense, zero-based ids
            for (index, var) in registry.variables().iter().enumerate() {
                prop_assert_eq!(var.id() as usize, index);
            }

            let all = registry.group(GROUP_ALL_ID).unwrap();
            let read = registry.group(GROUP_READ_ID).unwrap();
            let write = registry.group(GROUP_WRITE_ID).unwrap();

            let total: usize = vars.iter().map(|&(size, _)| size).sum();
            prop_assert_eq!(all.data_size(), total);
            prop_assert_eq!(read.data_size() + write.data_size(), total);
            prop_assert_eq!(read.len() + write.len(), all.len());

            for var in registry.variables() {
                prop_assert!(all.contains(var.id()));
                prop_assert_ne!(read.contains(var.id()), write.contains(var.id()));
                prop_assert_eq!(write.contains(var.id()), var.is_writable());
            }
        }
    }
}
