//! Update sources.
//!
//! The atoms an update reads and writes, in order. The order fixes the shape
//! of the drafts the handler receives:
//!
//! | sources                     | handler drafts                   |
//! |-----------------------------|----------------------------------|
//! | `Atom<A>`                   | `Draft<A>`                       |
//! | `(Atom<A>, Atom<B>)`        | `(Draft<A>, Draft<B>)`           |
//! | `Vec<Atom<A>>`              | `Vec<Draft<A>>`                  |
//!
//! Tuples of up to four atoms are supported.

use smallvec::{smallvec, SmallVec};

use super::atom::{erase, Atom, AtomKey, ErasedState, State};
use super::draft::Draft;
use crate::store::StoreError;

/// Inline capacity for per-update source lists.
#[doc(hidden)]
pub type SourceList<T> = SmallVec<[T; 4]>;

/// An ordered collection of atoms an update declares.
pub trait Sources: Clone + Send + Sync + 'static {
    /// What the handler receives, positionally matching the atoms.
    type Drafts;

    #[doc(hidden)]
    fn keys(&self) -> SourceList<AtomKey>;

    #[doc(hidden)]
    fn draft(&self, snapshots: &[ErasedState]) -> Result<Self::Drafts, StoreError>;

    #[doc(hidden)]
    fn settle(drafts: Self::Drafts) -> SourceList<ErasedState>;
}

impl<S: State> Sources for Atom<S> {
    type Drafts = Draft<S>;

    fn keys(&self) -> SourceList<AtomKey> {
        smallvec![self.key()]
    }

    fn draft(&self, snapshots: &[ErasedState]) -> Result<Self::Drafts, StoreError> {
        Ok(Draft::new(self.thaw(snapshots.first())?))
    }

    fn settle(drafts: Self::Drafts) -> SourceList<ErasedState> {
        smallvec![erase(drafts.finish())]
    }
}

impl<S: State> Sources for Vec<Atom<S>> {
    type Drafts = Vec<Draft<S>>;

    fn keys(&self) -> SourceList<AtomKey> {
        self.iter().map(Atom::key).collect()
    }

    fn draft(&self, snapshots: &[ErasedState]) -> Result<Self::Drafts, StoreError> {
        self.iter()
            .enumerate()
            .map(|(index, atom)| atom.thaw(snapshots.get(index)).map(Draft::new))
            .collect()
    }

    fn settle(drafts: Self::Drafts) -> SourceList<ErasedState> {
        drafts.into_iter().map(|draft| erase(draft.finish())).collect()
    }
}

macro_rules! tuple_sources {
    ($(($($name:ident : $index:tt),+)),+ $(,)?) => {$(
        impl<$($name: State),+> Sources for ($(Atom<$name>,)+) {
            type Drafts = ($(Draft<$name>,)+);

            fn keys(&self) -> SourceList<AtomKey> {
                smallvec![$(self.$index.key()),+]
            }

            fn draft(&self, snapshots: &[ErasedState]) -> Result<Self::Drafts, StoreError> {
                Ok(($(Draft::new(self.$index.thaw(snapshots.get($index))?),)+))
            }

            fn settle(drafts: Self::Drafts) -> SourceList<ErasedState> {
                smallvec![$(erase(drafts.$index.finish())),+]
            }
        }
    )+};
}

tuple_sources!(
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
);
