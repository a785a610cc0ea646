//! Module Table
//!
//! Owns every linked module for the duration of a run. Imports are resolved
//! transitively and memoized by name; the first load of a name wins.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::value::{new_slot, Cell, Slot};
use crate::bytecode::image::{BytecodeImage, Function};
use crate::config::NexConfig;
use crate::error::{NexError, NexResult};
use crate::loader::BytecodeLoader;

/// One linked compilation unit: its image plus global storage
pub struct Module {
    /// Empty for the entry module
    pub name: String,
    pub image: BytecodeImage,
    pub globals: Vec<Slot>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("globals", &self.globals.len())
            .finish()
    }
}

impl Module {
    /// Module with every global set to `none`
    pub fn new(name: impl Into<String>, image: BytecodeImage) -> Self {
        let globals = (0..image.global_size).map(|_| new_slot(Cell::None)).collect();
        Module {
            name: name.into(),
            image,
            globals,
        }
    }

    /// Global slot `index`
    pub fn global(&self, index: usize) -> NexResult<Slot> {
        self.globals
            .get(index)
            .cloned()
            .ok_or(NexError::InvalidGlobal(index))
    }

    /// Function table entry `index`
    pub fn function(&self, index: usize) -> NexResult<&Function> {
        self.image.function(index).ok_or_else(|| NexError::InvalidFunction {
            module: self.name.clone(),
            index,
        })
    }

    /// Global slot of an exported variable
    pub fn export_variable(&self, name: &str) -> NexResult<Slot> {
        let v = self
            .image
            .find_export_variable(name.as_bytes())
            .ok_or_else(|| NexError::VariableNotFound {
                module: self.name.clone(),
                name: name.to_string(),
            })?;
        self.global(v.index)
    }

    /// Function index of an export keyed by `name,descriptor`
    pub fn export_function(&self, key: &str) -> NexResult<usize> {
        self.image
            .find_export_function(key.as_bytes())
            .map(|f| f.index)
            .ok_or_else(|| NexError::FunctionNotFound {
                module: self.name.clone(),
                name: key.to_string(),
            })
    }
}

/// Locates the image bytes of an imported module by name
pub trait ModuleResolver {
    /// `Ok(None)` when no image exists under that name
    fn resolve(&self, name: &str) -> NexResult<Option<Vec<u8>>>;
}

/// Resolves imports on disk. A name containing `/` is a path (without
/// extension); any other name is looked up in the library directory, then
/// next to the entry module.
#[derive(Debug, Clone)]
pub struct FileResolver {
    library_dir: PathBuf,
    entry_dir: PathBuf,
    extension: String,
}

impl FileResolver {
    /// Resolver searching the library dir, then the entry module's dir
    pub fn new(config: &NexConfig, entry: &Path) -> Self {
        FileResolver {
            library_dir: config.library_dir.clone(),
            entry_dir: entry.parent().map(Path::to_path_buf).unwrap_or_default(),
            extension: config.module_extension.clone(),
        }
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let file = format!("{}.{}", name, self.extension);
        if name.contains('/') {
            vec![PathBuf::from(file)]
        } else {
            vec![self.library_dir.join(&file), self.entry_dir.join(&file)]
        }
    }
}

impl ModuleResolver for FileResolver {
    fn resolve(&self, name: &str) -> NexResult<Option<Vec<u8>>> {
        for path in self.candidates(name) {
            match fs::read(&path) {
                Ok(bytes) => {
                    debug!(module = name, path = %path.display(), "module located");
                    return Ok(Some(bytes));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(NexError::Io {
                        path: path.display().to_string(),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }
}

/// Serves images from memory, keyed by module name
#[derive(Debug, Default)]
pub struct MemoryResolver {
    images: HashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    /// Empty in-memory resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register module bytes under `name`
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.images.insert(name.into(), bytes);
        self
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> NexResult<Option<Vec<u8>>> {
        Ok(self.images.get(name).cloned())
    }
}

#[derive(Debug)]
pub struct ModuleTable {
    modules: IndexMap<String, Rc<Module>>,
    init_order: Vec<Rc<Module>>,
    skipped: Vec<String>,
}

impl ModuleTable {
    /// Link the entry image and everything it imports
    pub fn link(root: BytecodeImage, resolver: &dyn ModuleResolver) -> NexResult<Self> {
        let mut table = ModuleTable {
            modules: IndexMap::new(),
            init_order: Vec::new(),
            skipped: Vec::new(),
        };
        table.import("", root, resolver)?;
        debug!(
            modules = table.modules.len(),
            order = ?table.init_order.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            "linking complete"
        );
        Ok(table)
    }

    fn import(&mut self, name: &str, image: BytecodeImage, resolver: &dyn ModuleResolver) -> NexResult<()> {
        if self.modules.contains_key(name) {
            return Ok(());
        }
        let module = Rc::new(Module::new(name, image));
        self.modules.insert(name.to_string(), Rc::clone(&module));

        for imp in &module.image.imports {
            let dep = module.image.string(imp.name)?;
            if self.modules.contains_key(&dep) {
                continue;
            }
            match resolver.resolve(&dep)? {
                Some(bytes) => {
                    debug!(importer = name, module = %dep, "linking import");
                    let image = BytecodeLoader::load(&bytes)?;
                    self.import(&dep, image, resolver)?;
                }
                None if imp.optional => {
                    warn!(importer = name, module = %dep, "optional module not found");
                    self.skipped.push(dep);
                }
                None => return Err(NexError::ModuleNotFound(dep)),
            }
        }

        // Prepending after the imports have been linked leaves dependents
        // ahead of their dependencies; invoking in this order stacks the
        // dependencies on top, so they run first.
        if !name.is_empty() {
            self.init_order.insert(0, module);
        }
        Ok(())
    }

    /// The entry module
    pub fn root(&self) -> NexResult<Rc<Module>> {
        self.get("")
    }

    /// Linked module by name
    pub fn get(&self, name: &str) -> NexResult<Rc<Module>> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| NexError::ModuleNotFound(name.to_string()))
    }

    /// Whether `name` is linked
    pub fn is_imported(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Optional imports that could not be found
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Imported modules in initializer order
    pub fn init_order(&self) -> &[Rc<Module>] {
        &self.init_order
    }

    /// Linked module count, entry included
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing is linked
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::assembler::Assembler;
    use crate::bytecode::writer::ImageWriter;

    fn image(imports: &[(&str, bool)], globals: usize) -> BytecodeImage {
        let mut asm = Assembler::new();
        for (name, optional) in imports {
            asm.import(name, *optional);
        }
        asm.set_globals(globals);
        asm.finish()
    }

    fn names(table: &ModuleTable) -> Vec<&str> {
        table.init_order().iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn imports_are_linked_once() {
        let mut resolver = MemoryResolver::new();
        resolver
            .insert("a", ImageWriter::write(&image(&[("c", false)], 0)))
            .insert("b", ImageWriter::write(&image(&[("c", false)], 0)))
            .insert("c", ImageWriter::write(&image(&[], 1)));
        let table = ModuleTable::link(image(&[("a", false), ("b", false)], 0), &resolver).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(names(&table), vec!["b", "a", "c"]);
    }

    #[test]
    fn missing_import_is_a_link_error() {
        let resolver = MemoryResolver::new();
        let err = ModuleTable::link(image(&[("nope", false)], 0), &resolver).unwrap_err();
        assert!(matches!(err, NexError::ModuleNotFound(name) if name == "nope"));
    }

    #[test]
    fn missing_optional_import_is_skipped() {
        let resolver = MemoryResolver::new();
        let table = ModuleTable::link(image(&[("maybe", true)], 0), &resolver).unwrap();
        assert!(!table.is_imported("maybe"));
        assert_eq!(table.skipped(), ["maybe".to_string()]);
    }

    #[test]
    fn file_resolver_searches_library_then_entry_dir() {
        let lib = tempfile::tempdir().unwrap();
        let entry = tempfile::tempdir().unwrap();
        std::fs::write(entry.path().join("util.neonx"), b"entry").unwrap();
        let config = NexConfig {
            library_dir: lib.path().to_path_buf(),
            ..NexConfig::default()
        };
        let resolver = FileResolver::new(&config, &entry.path().join("main.neonx"));
        assert_eq!(resolver.resolve("util").unwrap(), Some(b"entry".to_vec()));

        std::fs::write(lib.path().join("util.neonx"), b"lib").unwrap();
        assert_eq!(resolver.resolve("util").unwrap(), Some(b"lib".to_vec()));
        assert_eq!(resolver.resolve("absent").unwrap(), None);
    }

    #[test]
    fn file_resolver_treats_slashed_names_as_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("direct.neonx"), b"x").unwrap();
        let resolver = FileResolver::new(&NexConfig::default(), Path::new("main.neonx"));
        let name = dir.path().join("direct").display().to_string();
        assert_eq!(resolver.resolve(&name).unwrap(), Some(b"x".to_vec()));
    }
}
