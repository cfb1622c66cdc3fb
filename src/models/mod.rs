pub mod audit;
pub mod menu;
pub mod paper;
pub mod permission;
pub mod profile;
pub mod role;
pub mod screen;
pub mod user;

pub use audit::AuditFields;
pub use menu::{build_tree, Menu, MenuNode};
pub use paper::{Paper, PaperStatus, PaperType};
pub use permission::{Permission, PermissionType};
pub use profile::{ProfileType, UserProfile};
pub use role::{Role, RoleDetail};
pub use screen::{Screen, ScreenType};
pub use user::{User, UserStatus};
