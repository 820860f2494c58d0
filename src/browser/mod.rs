//! 浏览器连接（只连接用户已登录的浏览器，不启动新浏览器）

pub mod connection;

pub use connection::connect_to_portal;
