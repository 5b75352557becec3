mod html;

pub mod asus;
pub mod avm_gpl;
pub mod linksys_gpl;

pub use asus::AsusSpider;
pub use avm_gpl::AvmGplSpider;
pub use linksys_gpl::LinksysGplSpider;
