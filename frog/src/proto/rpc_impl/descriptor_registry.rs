use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use prost_types::{FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto};

use crate::proto::rpc_types::descriptor::{MethodSpec, ServiceDescriptor};
use crate::proto::rpc_types::error::ConfigError;

/// The name a service descriptor is published under. Generated code refers to services by
/// this name, so the derivation must not change.
pub fn service_desc_name(service_name: &str) -> String {
    format!("{}_ServiceDesc", service_name)
}

/// Gzips a file descriptor into the blob format accepted by [`DescriptorRegistry::load`].
pub fn compress_file_descriptor(fd: &FileDescriptorProto) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&fd.encode_to_vec())?;
    encoder.finish()
}

fn malformed(file: &str, reason: String) -> ConfigError {
    ConfigError::MalformedDescriptor {
        file: file.to_string(),
        reason,
    }
}

/// Service descriptors by lookup name.
///
/// The registry is filled during startup through `&mut self` and shared read-only afterwards,
/// so lookups take no lock.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    services: HashMap<String, Arc<ServiceDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every service of a gzip-compressed `FileDescriptorProto` and returns the lookup
    /// names that were registered.
    pub fn load(&mut self, blob: &[u8]) -> Result<Vec<String>, ConfigError> {
        let mut raw = Vec::new();
        GzDecoder::new(blob).read_to_end(&mut raw)?;
        let fd = FileDescriptorProto::decode(raw.as_slice())?;
        self.load_file_descriptor(&fd)
    }

    /// Same as [`load`](Self::load) for an already decoded file descriptor.
    pub fn load_file_descriptor(
        &mut self,
        fd: &FileDescriptorProto,
    ) -> Result<Vec<String>, ConfigError> {
        let file = fd.name().to_string();

        // validate the whole file first so a bad service leaves the registry untouched
        let services = fd
            .service
            .iter()
            .map(|service| Self::build_service(&file, fd.package(), service))
            .collect::<Result<Vec<_>, _>>()?;

        let mut names = Vec::with_capacity(services.len());
        for service in services {
            let desc_name = service.desc_name();
            tracing::debug!(
                %desc_name,
                file = %file,
                methods = service.num_methods(),
                "register service descriptor"
            );
            if let Some(old) = self.services.insert(desc_name.clone(), service) {
                tracing::warn!(
                    %desc_name,
                    old_file = %old.file_name(),
                    new_file = %file,
                    "service descriptor registered twice, replacing previous one"
                );
            }
            names.push(desc_name);
        }
        Ok(names)
    }

    fn build_service(
        file: &str,
        package: &str,
        service: &ServiceDescriptorProto,
    ) -> Result<Arc<ServiceDescriptor>, ConfigError> {
        let service_name = service.name();
        if service_name.is_empty() {
            return Err(malformed(file, "service without name".to_string()));
        }

        let methods = service
            .method
            .iter()
            .map(|method| Self::build_method(file, service_name, method))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ServiceDescriptor::new(service_name, package, file, methods))
    }

    fn build_method(
        file: &str,
        service_name: &str,
        method: &MethodDescriptorProto,
    ) -> Result<MethodSpec, ConfigError> {
        let name = method.name();
        if name.is_empty() {
            return Err(malformed(
                file,
                format!("method without name in service {}", service_name),
            ));
        }
        if method.input_type().is_empty() || method.output_type().is_empty() {
            return Err(malformed(
                file,
                format!("method {}.{} lacks input or output type", service_name, name),
            ));
        }
        if method.client_streaming() || method.server_streaming() {
            return Err(ConfigError::StreamingMethod {
                service: service_name.to_string(),
                method: name.to_string(),
            });
        }

        Ok(MethodSpec {
            name: name.to_string(),
            input_type: method.input_type().to_string(),
            output_type: method.output_type().to_string(),
        })
    }

    /// Returns the descriptor registered under `name` (see [`service_desc_name`]).
    pub fn lookup(&self, name: &str) -> Option<Arc<ServiceDescriptor>> {
        self.services.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn method_proto(name: &str, input: &str, output: &str) -> MethodDescriptorProto {
        MethodDescriptorProto {
            name: Some(name.to_string()),
            input_type: Some(input.to_string()),
            output_type: Some(output.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn file_proto(
        file: &str,
        package: &str,
        services: Vec<(&str, Vec<MethodDescriptorProto>)>,
    ) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(file.to_string()),
            package: Some(package.to_string()),
            service: services
                .into_iter()
                .map(|(name, method)| ServiceDescriptorProto {
                    name: Some(name.to_string()),
                    method,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn calc_file() -> FileDescriptorProto {
        file_proto(
            "calc.proto",
            "demo",
            vec![
                (
                    "Calc",
                    vec![
                        method_proto("Add", ".demo.Pair", ".demo.Value"),
                        method_proto("Sub", ".demo.Pair", ".demo.Value"),
                        method_proto("Neg", ".demo.Value", ".demo.Value"),
                    ],
                ),
                ("Health", vec![method_proto("Check", ".demo.Empty", ".demo.Empty")]),
            ],
        )
    }

    #[test]
    fn load_then_lookup_keeps_order() {
        let mut reg = DescriptorRegistry::new();
        let blob = compress_file_descriptor(&calc_file()).unwrap();
        let names = reg.load(&blob).unwrap();
        assert_eq!(names, ["Calc_ServiceDesc", "Health_ServiceDesc"]);
        assert_eq!(reg.len(), 2);

        let calc = reg.lookup("Calc_ServiceDesc").unwrap();
        assert_eq!(calc.name(), "Calc");
        assert_eq!(calc.package(), "demo");
        assert_eq!(calc.file_name(), "calc.proto");
        let methods: Vec<_> = calc.methods().iter().map(|m| m.name()).collect();
        assert_eq!(methods, ["Add", "Sub", "Neg"]);
        assert_eq!(calc.method(2).unwrap().input_type(), ".demo.Value");
        assert_eq!(calc.method(0).unwrap().full_name(), "demo.Calc.Add");

        assert!(reg.lookup("Calc").is_none());
        assert!(reg.lookup("Missing_ServiceDesc").is_none());
    }

    #[test]
    fn file_without_services() {
        let mut reg = DescriptorRegistry::new();
        let blob = compress_file_descriptor(&file_proto("empty.proto", "demo", vec![])).unwrap();
        assert!(reg.load(&blob).unwrap().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn reregistration_replaces() {
        let mut reg = DescriptorRegistry::new();
        reg.load_file_descriptor(&calc_file()).unwrap();
        let other = file_proto(
            "calc_v2.proto",
            "demo.v2",
            vec![("Calc", vec![method_proto("Mul", ".demo.Pair", ".demo.Value")])],
        );
        reg.load_file_descriptor(&other).unwrap();

        assert_eq!(reg.len(), 2);
        let calc = reg.lookup("Calc_ServiceDesc").unwrap();
        assert_eq!(calc.file_name(), "calc_v2.proto");
        assert_eq!(calc.num_methods(), 1);
    }

    #[test]
    fn corrupt_blob_is_rejected() {
        let mut reg = DescriptorRegistry::new();
        assert!(matches!(
            reg.load(b"definitely not gzip"),
            Err(ConfigError::Decompress(_))
        ));

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0xff, 0xff, 0xff]).unwrap();
        let blob = encoder.finish().unwrap();
        assert!(matches!(reg.load(&blob), Err(ConfigError::Decode(_))));
        assert!(reg.is_empty());
    }

    #[test]
    fn malformed_method_is_rejected() {
        let mut reg = DescriptorRegistry::new();
        let fd = file_proto(
            "bad.proto",
            "demo",
            vec![
                ("Good", vec![method_proto("Ping", ".demo.A", ".demo.B")]),
                ("Bad", vec![method_proto("Ping", "", ".demo.B")]),
            ],
        );
        let err = reg.load_file_descriptor(&fd).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedDescriptor { ref file, .. } if file == "bad.proto"));
        assert!(reg.is_empty());
    }

    #[test]
    fn streaming_method_is_rejected() {
        let mut reg = DescriptorRegistry::new();
        let mut streaming = method_proto("Watch", ".demo.A", ".demo.B");
        streaming.server_streaming = Some(true);
        let fd = file_proto("stream.proto", "demo", vec![("Feed", vec![streaming])]);
        let err = reg.load_file_descriptor(&fd).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::StreamingMethod { ref service, ref method } if service == "Feed" && method == "Watch"
        ));
    }
}
