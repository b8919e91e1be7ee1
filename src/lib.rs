// noveldup - lib.rs
//
// Library entry point. `noveldup` is a duplicate-text detection engine for
// large collections of serialized-episode text files: given a set of file
// descriptors it parses filenames, blocks candidates, fingerprints content on
// demand, infers pairwise containment/version/exact relations, and merges
// them into disjoint duplicate groups with a recommended keeper each.
//
// There is no CLI, no config file, and no persisted state. Everything an
// implementer needs is in [`core::pipeline::analyze`].

pub mod core;
pub mod util;
