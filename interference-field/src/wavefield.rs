use crate::error::Result;
use crate::grid::GridField;

/// Role a physical buffer plays during one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Previous,
    Current,
    Next,
}

/// Assignment of the three roles onto slots `0..3`.
///
/// Stored as a single phase `p`: previous = `p`, current = `p + 1`,
/// next = `p + 2` (mod 3). Any phase is a bijection, so two roles can never
/// alias the same slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferRoles {
    phase: usize,
}

impl BufferRoles {
    pub fn slot(&self, role: Role) -> usize {
        let offset = match role {
            Role::Previous => 0,
            Role::Current => 1,
            Role::Next => 2,
        };
        (self.phase + offset) % 3
    }

    /// Relabel after a step: old previous becomes next, old current becomes
    /// previous, the freshly written next becomes current.
    pub fn rotated(self) -> Self {
        Self {
            phase: (self.phase + 1) % 3,
        }
    }
}

/// Exactly three grid buffers plus their role assignment.
///
/// Rotation only touches [`BufferRoles`]; cell data is never copied between
/// slots, and no slot is reallocated until the whole set is rebuilt.
#[derive(Clone, Debug)]
pub struct FieldBufferSet {
    slots: [GridField; 3],
    roles: BufferRoles,
}

impl FieldBufferSet {
    pub fn new(resolution: usize) -> Result<Self> {
        // All three buffers start at zero
        Ok(Self {
            slots: [
                GridField::new(resolution)?,
                GridField::new(resolution)?,
                GridField::new(resolution)?,
            ],
            roles: BufferRoles::default(),
        })
    }

    pub fn resolution(&self) -> usize {
        self.slots[0].resolution()
    }

    pub fn roles(&self) -> BufferRoles {
        self.roles
    }

    pub fn field(&self, role: Role) -> &GridField {
        &self.slots[self.roles.slot(role)]
    }

    pub fn field_mut(&mut self, role: Role) -> &mut GridField {
        &mut self.slots[self.roles.slot(role)]
    }

    /// Borrow `(previous, current, next)` for one step: two frozen inputs and
    /// the write target.
    pub fn step_views(&mut self) -> (&GridField, &GridField, &mut GridField) {
        match self.roles.phase {
            0 => {
                let [previous, current, next] = &mut self.slots;
                (&*previous, &*current, next)
            }
            1 => {
                let [next, previous, current] = &mut self.slots;
                (&*previous, &*current, next)
            }
            _ => {
                let [current, next, previous] = &mut self.slots;
                (&*previous, &*current, next)
            }
        }
    }

    pub fn rotate(&mut self) {
        self.roles = self.roles.rotated();
    }

    pub fn zero(&mut self) {
        for slot in &mut self.slots {
            slot.zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_bijection(roles: BufferRoles) {
        let slots: HashSet<usize> = [Role::Previous, Role::Current, Role::Next]
            .iter()
            .map(|&r| roles.slot(r))
            .collect();
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|&s| s < 3));
    }

    #[test]
    fn test_roles_rotate_as_relabeling() {
        let mut roles = BufferRoles::default();
        for _ in 0..7 {
            assert_bijection(roles);
            let rotated = roles.rotated();
            assert_eq!(rotated.slot(Role::Next), roles.slot(Role::Previous));
            assert_eq!(rotated.slot(Role::Previous), roles.slot(Role::Current));
            assert_eq!(rotated.slot(Role::Current), roles.slot(Role::Next));
            roles = rotated;
        }
        // three rotations bring the assignment back
        assert_eq!(
            BufferRoles::default().rotated().rotated().rotated(),
            BufferRoles::default()
        );
    }

    #[test]
    fn test_step_views_follow_roles() {
        let mut buffers = FieldBufferSet::new(3).unwrap();
        for phase in 0..3 {
            buffers.field_mut(Role::Previous).write(0, 0, 1.0).unwrap();
            buffers.field_mut(Role::Current).write(0, 0, 2.0).unwrap();
            buffers.field_mut(Role::Next).write(0, 0, 3.0).unwrap();

            let (previous, current, next) = buffers.step_views();
            assert_eq!(previous.read(0, 0).unwrap(), 1.0, "phase {}", phase);
            assert_eq!(current.read(0, 0).unwrap(), 2.0, "phase {}", phase);
            assert_eq!(next.read(0, 0).unwrap(), 3.0, "phase {}", phase);

            buffers.rotate();
        }
    }

    #[test]
    fn test_rotation_moves_no_data() {
        let mut buffers = FieldBufferSet::new(4).unwrap();
        buffers.field_mut(Role::Next).write(1, 2, 5.0).unwrap();
        let next_ptr = buffers.field(Role::Next).view().as_ptr();

        buffers.rotate();

        // the written buffer is now current, at the same address
        assert_eq!(buffers.field(Role::Current).read(1, 2).unwrap(), 5.0);
        assert_eq!(buffers.field(Role::Current).view().as_ptr(), next_ptr);
    }

    #[test]
    fn test_zero_clears_all_slots() {
        let mut buffers = FieldBufferSet::new(3).unwrap();
        for role in [Role::Previous, Role::Current, Role::Next] {
            buffers.field_mut(role).write(2, 2, 9.0).unwrap();
        }
        buffers.zero();
        for role in [Role::Previous, Role::Current, Role::Next] {
            assert_eq!(buffers.field(role).peak_abs(), 0.0);
        }
    }
}
