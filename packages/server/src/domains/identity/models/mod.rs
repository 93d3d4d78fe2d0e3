pub mod user;

pub use user::{
    normalize_email, NewUserRow, User, UserPatch, FRM_BROWSER, FRM_EMAIL_LINK, FRM_GOOGLE,
    FRM_NATIVE, STATUS_ACTIVE, STATUS_DELETED,
};
