use crate::flag::Flag;

/// Address of a flag inside a group tree: child group indices, then the
/// flag's index in the innermost group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FlagPath {
    pub groups: Vec<usize>,
    pub index: usize,
}

/// A named bag of flags and nested groups.
///
/// Groups only partition flags for presentation, with two exceptions that
/// affect matching: a `namespace` prefixes the long names of every flag
/// below it, and nested namespaces compose (`sip.sap.opt`). `hidden` only
/// removes the group from help output.
#[derive(Debug, Clone, Default)]
pub struct Group {
    name: String,
    help: String,
    namespace: Option<String>,
    hidden: bool,
    flags: Vec<Flag>,
    groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_help(&self) -> &str {
        &self.help
    }

    pub fn get_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Flags declared directly in this group.
    pub fn get_flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn get_groups(&self) -> &[Group] {
        &self.groups
    }

    /// Find a nested group (this one included) by name.
    pub fn find_group(&self, name: &str) -> Option<&Group> {
        if self.name == name {
            return Some(self);
        }
        self.groups.iter().find_map(|g| g.find_group(name))
    }

    pub(crate) fn push_flag(&mut self, flag: Flag) {
        self.flags.push(flag);
    }

    pub(crate) fn push_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// Visit every flag in declaration order: own flags first, then nested
    /// groups depth-first.
    pub(crate) fn visit<'a>(&'a self, f: &mut dyn FnMut(FlagPath, &'a Flag)) {
        let mut groups = Vec::new();
        self.visit_inner(&mut groups, f);
    }

    fn visit_inner<'a>(&'a self, groups: &mut Vec<usize>, f: &mut dyn FnMut(FlagPath, &'a Flag)) {
        for (index, flag) in self.flags.iter().enumerate() {
            f(
                FlagPath {
                    groups: groups.clone(),
                    index,
                },
                flag,
            );
        }
        for (i, group) in self.groups.iter().enumerate() {
            groups.push(i);
            group.visit_inner(groups, f);
            groups.pop();
        }
    }

    /// Qualify long names with namespaces and derive missing flag ids.
    pub(crate) fn prepare(&mut self, prefix: &str, delimiter: &str) {
        let prefix = match &self.namespace {
            Some(ns) if prefix.is_empty() => ns.clone(),
            Some(ns) => format!("{prefix}{delimiter}{ns}"),
            None => prefix.to_string(),
        };
        for flag in &mut self.flags {
            let qualified = flag.get_long().map(|long| {
                if prefix.is_empty() {
                    long.to_string()
                } else {
                    format!("{prefix}{delimiter}{long}")
                }
            });
            flag.prepare(qualified);
        }
        for group in &mut self.groups {
            group.prepare(&prefix, delimiter);
        }
    }

    pub(crate) fn flag_at(&self, path: &FlagPath) -> Option<&Flag> {
        let mut group = self;
        for &i in &path.groups {
            group = group.groups.get(i)?;
        }
        group.flags.get(path.index)
    }

    pub(crate) fn flag_at_mut(&mut self, path: &FlagPath) -> Option<&mut Flag> {
        let mut group = self;
        for &i in &path.groups {
            group = group.groups.get_mut(i)?;
        }
        group.flags.get_mut(path.index)
    }

    pub(crate) fn flags_mut(&mut self) -> Vec<&mut Flag> {
        let mut out: Vec<&mut Flag> = self.flags.iter_mut().collect();
        for group in &mut self.groups {
            out.extend(group.flags_mut());
        }
        out
    }
}

/// Create a group builder. Shorthand for [`Group::new`].
pub fn group(name: impl Into<String>) -> Group {
    Group::new(name)
}
