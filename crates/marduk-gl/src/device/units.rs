/// What a texture unit is used for.
///
/// Logical units 0..=3 carry these roles in order; any unit above 3 has no
/// special role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnitRole {
    Primary,
    Secondary,
    Shadow,
    /// Second stage of quality shadow compositing.
    ShadowCompose,
}

impl UnitRole {
    pub fn of_logical(unit: usize) -> Option<UnitRole> {
        match unit {
            0 => Some(UnitRole::Primary),
            1 => Some(UnitRole::Secondary),
            2 => Some(UnitRole::Shadow),
            3 => Some(UnitRole::ShadowCompose),
            _ => None,
        }
    }
}

/// Assignment of roles to physical units.
///
/// Quality shadows run the shadow stages first so that the primary and
/// secondary stages modulate an already shadowed color; the other roles then
/// shift up by two.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct UnitMap {
    quality_shadows: bool,
}

impl UnitMap {
    #[inline]
    pub const fn new(quality_shadows: bool) -> Self {
        Self { quality_shadows }
    }

    #[inline]
    pub const fn quality_shadows(self) -> bool {
        self.quality_shadows
    }

    pub const fn physical(self, role: UnitRole) -> u32 {
        match (self.quality_shadows, role) {
            (false, UnitRole::Primary) => 0,
            (false, UnitRole::Secondary) => 1,
            (false, UnitRole::Shadow) => 2,
            (false, UnitRole::ShadowCompose) => 3,
            (true, UnitRole::Shadow) => 0,
            (true, UnitRole::ShadowCompose) => 1,
            (true, UnitRole::Primary) => 2,
            (true, UnitRole::Secondary) => 3,
        }
    }

    /// Physical unit of a logical unit index.
    pub fn physical_of(self, logical: usize) -> u32 {
        match UnitRole::of_logical(logical) {
            Some(role) => self.physical(role),
            None => logical as u32,
        }
    }
}
