pub mod octree;
pub mod spatial;

pub(crate) mod object_pool;
