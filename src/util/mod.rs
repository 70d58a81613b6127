/*!
Supporting types shared by the matching engine.
*/

pub mod matchtypes;
pub(crate) mod prefilter;
