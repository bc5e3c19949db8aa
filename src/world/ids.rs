//! Stable arena indices for catalog entities.
//!
//! Entities are never removed from the arena, so an id stays valid for the
//! lifetime of the [`World`](super::World) that issued it.

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Position in the owning arena vector.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

arena_id!(
    /// Index of a [`Texture`](super::Texture).
    TextureId
);
arena_id!(
    /// Index of a [`Material`](super::Material).
    MaterialId
);
arena_id!(
    /// Index of a [`MeshFactory`](super::MeshFactory).
    MeshFactoryId
);
arena_id!(
    /// Index of a [`Sector`](super::Sector).
    SectorId
);
arena_id!(
    /// Index of a [`MeshInstance`](super::MeshInstance).
    MeshInstanceId
);
arena_id!(
    /// Index of a [`Portal`](super::Portal).
    PortalId
);
arena_id!(
    /// Index of a [`Light`](super::Light).
    LightId
);
