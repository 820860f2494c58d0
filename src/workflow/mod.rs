//! 流程层
//!
//! 定义跨页面的导航流程

pub mod navigation;

pub use navigation::{detect_phase, NavigationStateMachine, NavigationTargets};
