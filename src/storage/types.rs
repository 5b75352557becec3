use serde::Serialize;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Default)]
pub enum StorageCategory {
    #[default]
    Data, // Firmware records
    Custom(String), // For any custom storage needs
}
