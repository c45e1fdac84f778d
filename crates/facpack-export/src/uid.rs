use crate::Uid;

/// Hands out export [`Uid`]s.
///
/// Mods and modpacks are counted separately, both starting from `0`. Every
/// export session owns its own allocator, so two exports of the same input
/// produce the same Uids.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
#[must_use]
pub struct UidAllocator {
    next_mod: Uid,
    next_modpack: Uid,
}

impl UidAllocator {
    pub const fn new() -> Self {
        Self {
            next_mod: 0,
            next_modpack: 0,
        }
    }

    pub const fn next_mod_uid(&mut self) -> Uid {
        let uid = self.next_mod;
        self.next_mod += 1;
        uid
    }

    pub const fn next_modpack_uid(&mut self) -> Uid {
        let uid = self.next_modpack;
        self.next_modpack += 1;
        uid
    }

    pub const fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::UidAllocator;

    #[test]
    fn counters_are_independent() {
        let mut allocator = UidAllocator::new();
        assert_eq!(allocator.next_mod_uid(), 0);
        assert_eq!(allocator.next_mod_uid(), 1);
        assert_eq!(allocator.next_modpack_uid(), 0);
        assert_eq!(allocator.next_mod_uid(), 2);

        allocator.reset();
        assert_eq!(allocator.next_mod_uid(), 0);
        assert_eq!(allocator.next_modpack_uid(), 0);
    }
}
