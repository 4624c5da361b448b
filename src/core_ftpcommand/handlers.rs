//! Explicit registration table: command name -> handler. No runtime
//! scanning; a handler exists because a line here says so.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core_ftpcommand::CommandHandler;
use crate::core_network::pasv::{EpsvHandler, PasvHandler};
use crate::core_network::port::{EprtHandler, PortHandler};

pub fn initialize_command_handlers() -> HashMap<&'static str, Arc<dyn CommandHandler>> {
    let all: Vec<Arc<dyn CommandHandler>> = vec![
        Arc::new(crate::core_ftpcommand::user::UserHandler),
        Arc::new(crate::core_ftpcommand::pass::PassHandler),
        Arc::new(crate::core_ftpcommand::quit::QuitHandler),
        Arc::new(crate::core_ftpcommand::pwd::PwdHandler),
        Arc::new(crate::core_ftpcommand::cwd::CwdHandler),
        Arc::new(crate::core_ftpcommand::cdup::CdupHandler),
        Arc::new(crate::core_ftpcommand::mkd::MkdHandler),
        Arc::new(crate::core_ftpcommand::rmd::RmdHandler),
        Arc::new(crate::core_ftpcommand::dele::DeleHandler),
        Arc::new(crate::core_ftpcommand::rnfr::RnfrHandler),
        Arc::new(crate::core_ftpcommand::rnto::RntoHandler),
        Arc::new(crate::core_ftpcommand::list::ListHandler),
        Arc::new(crate::core_ftpcommand::mlst::MlstHandler),
        Arc::new(crate::core_ftpcommand::mlst::MlsdHandler),
        Arc::new(crate::core_ftpcommand::retr::RetrHandler),
        Arc::new(crate::core_ftpcommand::stor::StorHandler),
        Arc::new(crate::core_ftpcommand::stou::StouHandler),
        Arc::new(crate::core_ftpcommand::appe::AppeHandler),
        Arc::new(crate::core_ftpcommand::rest::RestHandler),
        Arc::new(crate::core_ftpcommand::size::SizeHandler),
        Arc::new(crate::core_ftpcommand::mdtm::MdtmHandler),
        Arc::new(crate::core_ftpcommand::mff::MffHandler),
        Arc::new(crate::core_ftpcommand::mode::ModeHandler),
        Arc::new(crate::core_ftpcommand::stru::StruHandler),
        Arc::new(crate::core_ftpcommand::type_::TypeHandler),
        Arc::new(crate::core_ftpcommand::abor::AborHandler),
        Arc::new(crate::core_ftpcommand::noop::NoopHandler),
        Arc::new(crate::core_ftpcommand::feat::FeatHandler),
        Arc::new(crate::core_ftpcommand::opts::OptsHandler),
        Arc::new(crate::core_ftpcommand::syst::SystHandler),
        Arc::new(crate::core_ftpcommand::stat::StatHandler),
        Arc::new(crate::core_ftpcommand::site::SiteHandler),
        Arc::new(crate::core_ftpcommand::auth::AuthHandler),
        Arc::new(crate::core_ftpcommand::auth::PbszHandler),
        Arc::new(crate::core_ftpcommand::auth::ProtHandler),
        Arc::new(PasvHandler),
        Arc::new(EpsvHandler),
        Arc::new(PortHandler),
        Arc::new(EprtHandler),
    ];

    let mut handlers: HashMap<&'static str, Arc<dyn CommandHandler>> = HashMap::new();
    for handler in all {
        for name in handler.names() {
            handlers.insert(*name, Arc::clone(&handler));
        }
    }
    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_share_one_handler() {
        let handlers = initialize_command_handlers();
        assert!(handlers.contains_key("CWD"));
        assert!(handlers.contains_key("XCWD"));
        assert!(Arc::ptr_eq(&handlers["CWD"], &handlers["XCWD"]));
    }

    #[test]
    fn minimum_command_set_is_registered() {
        let handlers = initialize_command_handlers();
        for name in [
            "USER", "PASS", "CWD", "CDUP", "PWD", "MKD", "RMD", "DELE", "RNFR", "RNTO", "LIST",
            "NLST", "MLST", "MLSD", "RETR", "STOR", "STOU", "APPE", "REST", "SIZE", "MDTM", "MFF",
            "MODE", "STRU", "TYPE", "PASV", "EPSV", "PORT", "EPRT", "ABOR", "NOOP", "FEAT", "OPTS",
            "SYST", "STAT", "SITE", "QUIT", "AUTH", "PBSZ", "PROT",
        ] {
            assert!(handlers.contains_key(name), "missing handler for {}", name);
        }
    }

    #[test]
    fn abortable_flags_cover_data_transfers() {
        let handlers = initialize_command_handlers();
        for name in ["RETR", "STOR", "STOU", "APPE", "LIST", "NLST", "MLSD"] {
            assert!(handlers[name].is_abortable(), "{} should be abortable", name);
        }
        for name in ["ABOR", "PWD", "QUIT", "MLST"] {
            assert!(!handlers[name].is_abortable(), "{} should not be abortable", name);
        }
    }
}
