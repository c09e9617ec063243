pub mod cookie;
pub mod jwt;
pub mod pwd;
pub mod signature;
pub mod token;
pub mod validated_form;
pub mod validator;
