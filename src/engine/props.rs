//! Property-name shortening.
//!
//! Runs on the parsed program before `oxc_minifier`, which leaves property
//! names alone. Only static names are touched (`o._x`, `{ _x: 1 }`, class
//! members); computed and quoted keys keep their spelling.

use crate::config::PropsOptions;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    AssignmentTargetPropertyIdentifier, BindingProperty, IdentifierName, MetaProperty,
    ModuleExportName, ObjectProperty, Program, PropertyKey, StringLiteral,
};
use oxc_ast_visit::{Visit, VisitMut, walk};
use oxc_span::Atom;
use std::collections::{HashMap, HashSet};

const KEYWORDS: &[&str] = &[
    "do", "if", "in", "for", "let", "new", "try", "var", "case", "else", "enum", "eval", "null",
    "this", "true", "void", "with",
];

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$_";
const NEXT_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$_0123456789";

fn nth_name(mut n: usize) -> String {
    let mut name = String::new();
    name.push(FIRST_CHARS[n % FIRST_CHARS.len()] as char);
    n /= FIRST_CHARS.len();
    while n > 0 {
        n -= 1;
        name.push(NEXT_CHARS[n % NEXT_CHARS.len()] as char);
        n /= NEXT_CHARS.len();
    }
    name
}

/// Names already in use as properties or strings, and names pinned by
/// shorthand syntax where key and variable share one spelling.
#[derive(Default)]
struct PropertyNames {
    seen: HashSet<String>,
    pinned: HashSet<String>,
}

impl PropertyNames {
    fn pin_key(&mut self, key: &PropertyKey<'_>) {
        if let PropertyKey::StaticIdentifier(name) = key {
            self.pinned.insert(name.name.to_string());
        }
    }
}

impl<'a> Visit<'a> for PropertyNames {
    fn visit_identifier_name(&mut self, it: &IdentifierName<'a>) {
        self.seen.insert(it.name.to_string());
    }

    fn visit_string_literal(&mut self, it: &StringLiteral<'a>) {
        self.seen.insert(it.value.to_string());
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            self.pin_key(&it.key);
        }
        walk::walk_object_property(self, it);
    }

    fn visit_binding_property(&mut self, it: &BindingProperty<'a>) {
        if it.shorthand {
            self.pin_key(&it.key);
        }
        walk::walk_binding_property(self, it);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        it: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        self.pinned.insert(it.binding.name.to_string());
        walk::walk_assignment_target_property_identifier(self, it);
    }
}

struct PropertyRenamer<'a, 'o> {
    allocator: &'a Allocator,
    options: &'o PropsOptions,
    names: PropertyNames,
    next: usize,
    renamed: HashMap<String, &'a str>,
}

impl<'a> PropertyRenamer<'a, '_> {
    fn selected(&self, name: &str) -> bool {
        let matched = match &self.options.regex {
            Some(rule) => rule.matches(name),
            None => name.starts_with('_'),
        };
        matched
            && !self.names.pinned.contains(name)
            && !self.options.reserved.iter().any(|reserved| reserved == name)
    }

    fn short_name(&mut self, name: &str) -> Option<&'a str> {
        if !self.selected(name) {
            return None;
        }
        if let Some(short) = self.renamed.get(name) {
            return Some(*short);
        }
        let candidate = loop {
            let candidate = nth_name(self.next);
            self.next += 1;
            if !KEYWORDS.contains(&candidate.as_str()) && self.names.seen.insert(candidate.clone())
            {
                break candidate;
            }
        };
        let short: &'a str = self.allocator.alloc_str(&candidate);
        self.renamed.insert(name.to_string(), short);
        Some(short)
    }
}

impl<'a> VisitMut<'a> for PropertyRenamer<'a, '_> {
    fn visit_identifier_name(&mut self, it: &mut IdentifierName<'a>) {
        if let Some(short) = self.short_name(it.name.as_str()) {
            it.name = Atom::from(short);
        }
    }

    // `new.target` and `import.meta`
    fn visit_meta_property(&mut self, _it: &mut MetaProperty<'a>) {}

    // imported and exported names are shared with other modules
    fn visit_module_export_name(&mut self, _it: &mut ModuleExportName<'a>) {}
}

/// Rename the properties of `program` selected by `options`.
///
/// Without a `regex`, properties starting with `_` are renamed. One name
/// always maps to the same short name within the program.
pub fn mangle_properties<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    options: &PropsOptions,
) {
    let mut names = PropertyNames::default();
    names.visit_program(program);

    let mut renamer = PropertyRenamer {
        allocator,
        options,
        names,
        next: 0,
        renamed: HashMap::new(),
    };
    renamer.visit_program(program);
}
