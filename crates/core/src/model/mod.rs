pub mod call_tree;
pub mod frame;
pub mod profile;

pub use call_tree::{CallTree, CallTreeNode, NodeId};
pub use frame::{Frame, FrameInfo, FrameRegistry};
pub use profile::{Profile, ProfileGroup};
