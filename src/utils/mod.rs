///! 工具模块
///! 布局探测、十六进制转储等调试辅助功能

pub mod layout_probe;

pub use layout_probe::{DataAnalysis, LayoutCheck, LayoutProbe};
