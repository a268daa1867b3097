//! Generic classfile-specific definitions

/// Header of Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Attribute names understood by the writer and the reader
pub mod attribute_names {
    pub const CODE: &str = "Code";
    pub const EXCEPTIONS: &str = "Exceptions";
    pub const SOURCE_FILE: &str = "SourceFile";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
}

/// JVM version constants
pub mod major_versions {
    pub const JAVA_5_0: u16 = 49;
    pub const JAVA_6_0: u16 = 50;
    pub const JAVA_7: u16 = 51;
    pub const JAVA_8: u16 = 52;
    pub const JAVA_11: u16 = 55;
    pub const JAVA_17: u16 = 61;
    pub const JAVA_21: u16 = 65;
}

pub const JAVA_1_8: u16 = major_versions::JAVA_8;

/// Highest class file version the reader accepts
pub const MAX_SUPPORTED_MAJOR: u16 = major_versions::JAVA_21;

/// Access flags shared by classes, fields and methods
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
}

/// Map a `-target` style Java version (6, 7, 8, 11...) to a class file major version
pub fn major_for_java_version(version: u8) -> Option<u16> {
    match version {
        5 => Some(major_versions::JAVA_5_0),
        6 => Some(major_versions::JAVA_6_0),
        7 => Some(major_versions::JAVA_7),
        8..=21 => Some(44 + version as u16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_version_mapping() {
        assert_eq!(major_for_java_version(6), Some(50));
        assert_eq!(major_for_java_version(8), Some(JAVA_1_8));
        assert_eq!(major_for_java_version(17), Some(major_versions::JAVA_17));
        assert_eq!(major_for_java_version(4), None);
    }
}
