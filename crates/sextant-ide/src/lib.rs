//! Navigation providers: stateless query functions over the symbol index
//! and the open-buffer overlay.
//!
//! Every provider is a free function taking `(&SymbolIndex, &Buffers, file,
//! position)`. The index supplies last-folded truth; buffers supply live
//! text, so result ranges are clamped against the overlay of whichever file
//! they land in. Absence is always an empty result, never an error.

mod nav;

pub use nav::{definition, document_highlight, references, HighlightSpan};
