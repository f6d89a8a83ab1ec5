use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::GeometryLoadError;

use super::tokenizer::{self, Entity, Token};

/// All entities of a data section, keyed by id.
#[derive(Debug, Default)]
pub struct EntityTable<'a> {
    entities: FxHashMap<u32, Entity<'a>>,
}

impl<'a> EntityTable<'a> {
    /// Tokenizes `statements` in parallel and indexes them by id.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for the first malformed statement in file
    /// order, or [`GeometryLoadError::DuplicateEntity`].
    pub fn parse(statements: &[&'a str]) -> Result<Self, GeometryLoadError> {
        let parsed: Vec<Result<Entity<'a>, (u32, String)>> = statements
            .par_iter()
            .map(|s| {
                tokenizer::parse_statement(s)
                    .map_err(|message| (tokenizer::leading_id(s).unwrap_or(0), message))
            })
            .collect();

        let mut entities = FxHashMap::default();
        entities.reserve(parsed.len());
        for result in parsed {
            let entity = result.map_err(|(id, message)| GeometryLoadError::Syntax { id, message })?;
            let id = entity.id;
            if entities.insert(id, entity).is_some() {
                return Err(GeometryLoadError::DuplicateEntity(id));
            }
        }
        Ok(Self { entities })
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` when the table has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up entity `id`, reporting `referenced_by` if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryLoadError::MissingEntity`].
    pub fn get(&self, id: u32, referenced_by: u32) -> Result<&Entity<'a>, GeometryLoadError> {
        self.entities
            .get(&id)
            .ok_or(GeometryLoadError::MissingEntity { id, referenced_by })
    }

    /// Ids of all entities whose type (or any complex part) is one of
    /// `names`, sorted ascending.
    #[must_use]
    pub fn ids_of(&self, names: &[&str]) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entities
            .values()
            .filter(|e| e.parts.iter().any(|p| names.contains(&p.name)))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Iterates over all entities in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity<'a>> {
        self.entities.values()
    }
}

/// Typed access to the parameters of one entity part.
#[derive(Debug, Clone, Copy)]
pub struct Args<'e, 'a> {
    id: u32,
    name: &'a str,
    params: &'e [Token<'a>],
}

impl<'e, 'a> Args<'e, 'a> {
    /// Parameters of a simple entity, checked to be of type `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryLoadError::UnexpectedEntity`] on a type mismatch.
    pub fn of(entity: &'e Entity<'a>, expected: &'static str) -> Result<Self, GeometryLoadError> {
        Self::part(entity, expected).ok_or_else(|| GeometryLoadError::UnexpectedEntity {
            id: entity.id,
            expected,
            found: entity.name().to_string(),
        })
    }

    /// Parameters of the part named `name`, if the entity has one.
    #[must_use]
    pub fn part(entity: &'e Entity<'a>, name: &str) -> Option<Self> {
        entity.part(name).map(|p| Self {
            id: entity.id,
            name: p.name,
            params: &p.params,
        })
    }

    /// Parameters of the first part, whatever its type.
    #[must_use]
    pub fn any(entity: &'e Entity<'a>) -> Self {
        const EMPTY: &[Token<'static>] = &[];
        match entity.parts.first() {
            Some(p) => Self {
                id: entity.id,
                name: p.name,
                params: &p.params,
            },
            None => Self {
                id: entity.id,
                name: "",
                params: EMPTY,
            },
        }
    }

    /// Entity id these parameters belong to.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Type name of the part.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` when the part has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Builds an [`GeometryLoadError::InvalidAttribute`] for this entity.
    #[must_use]
    pub fn invalid(&self, message: impl Into<String>) -> GeometryLoadError {
        GeometryLoadError::InvalidAttribute {
            id: self.id,
            entity: self.name.to_string(),
            message: message.into(),
        }
    }

    fn at(&self, index: usize) -> Result<&'e Token<'a>, GeometryLoadError> {
        self.params
            .get(index)
            .ok_or_else(|| self.invalid(format!("missing parameter {index}")))
    }

    /// A real-valued parameter; integers are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is missing or not numeric.
    pub fn real(&self, index: usize) -> Result<f64, GeometryLoadError> {
        token_real(self.at(index)?).ok_or_else(|| self.invalid(format!("parameter {index} is not a number")))
    }

    /// A non-negative integer parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is missing, negative or not an integer.
    pub fn count(&self, index: usize) -> Result<usize, GeometryLoadError> {
        match self.at(index)? {
            Token::Int(i) => usize::try_from(*i)
                .map_err(|_| self.invalid(format!("parameter {index} is negative"))),
            _ => Err(self.invalid(format!("parameter {index} is not an integer"))),
        }
    }

    /// An entity reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is missing or not a reference.
    pub fn reference(&self, index: usize) -> Result<u32, GeometryLoadError> {
        match self.at(index)? {
            Token::Ref(id) => Ok(*id),
            _ => Err(self.invalid(format!("parameter {index} is not a reference"))),
        }
    }

    /// An optional entity reference (`$` gives `None`).
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is present but not a reference.
    pub fn optional_reference(&self, index: usize) -> Result<Option<u32>, GeometryLoadError> {
        match self.params.get(index) {
            None | Some(Token::Null | Token::Derived) => Ok(None),
            Some(Token::Ref(id)) => Ok(Some(*id)),
            Some(_) => Err(self.invalid(format!("parameter {index} is not a reference"))),
        }
    }

    /// A `.T.`/`.F.` parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is missing or not a boolean.
    pub fn boolean(&self, index: usize) -> Result<bool, GeometryLoadError> {
        match self.at(index)? {
            Token::Enum("T" | "TRUE") => Ok(true),
            Token::Enum("F" | "FALSE") => Ok(false),
            _ => Err(self.invalid(format!("parameter {index} is not a boolean"))),
        }
    }

    /// A string parameter (raw, still escaped).
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is missing or not a string.
    pub fn string(&self, index: usize) -> Result<&'a str, GeometryLoadError> {
        match self.at(index)? {
            Token::Str(s) => Ok(s),
            _ => Err(self.invalid(format!("parameter {index} is not a string"))),
        }
    }

    /// An aggregate parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is missing or not a list.
    pub fn list(&self, index: usize) -> Result<&'e [Token<'a>], GeometryLoadError> {
        match self.at(index)? {
            Token::List(items) => Ok(items),
            _ => Err(self.invalid(format!("parameter {index} is not a list"))),
        }
    }

    /// A list of entity references.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is not a list of references.
    pub fn references(&self, index: usize) -> Result<Vec<u32>, GeometryLoadError> {
        self.list(index)?
            .iter()
            .map(|t| match t {
                Token::Ref(id) => Ok(*id),
                _ => Err(self.invalid(format!("parameter {index} holds a non-reference"))),
            })
            .collect()
    }

    /// A list of lists of entity references.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is not a nested reference list.
    pub fn reference_grid(&self, index: usize) -> Result<Vec<Vec<u32>>, GeometryLoadError> {
        self.list(index)?
            .iter()
            .map(|row| match row {
                Token::List(items) => items
                    .iter()
                    .map(|t| match t {
                        Token::Ref(id) => Ok(*id),
                        _ => Err(self.invalid(format!("parameter {index} holds a non-reference"))),
                    })
                    .collect(),
                _ => Err(self.invalid(format!("parameter {index} is not a nested list"))),
            })
            .collect()
    }

    /// A list of numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is not a numeric list.
    pub fn reals(&self, index: usize) -> Result<Vec<f64>, GeometryLoadError> {
        self.list(index)?
            .iter()
            .map(|t| token_real(t).ok_or_else(|| self.invalid(format!("parameter {index} holds a non-number"))))
            .collect()
    }

    /// A list of lists of numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is not a nested numeric list.
    pub fn real_grid(&self, index: usize) -> Result<Vec<Vec<f64>>, GeometryLoadError> {
        self.list(index)?
            .iter()
            .map(|row| match row {
                Token::List(items) => items
                    .iter()
                    .map(|t| token_real(t).ok_or_else(|| self.invalid(format!("parameter {index} holds a non-number"))))
                    .collect(),
                _ => Err(self.invalid(format!("parameter {index} is not a nested list"))),
            })
            .collect()
    }

    /// A list of non-negative integers.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is not a list of counts.
    pub fn counts(&self, index: usize) -> Result<Vec<usize>, GeometryLoadError> {
        self.list(index)?
            .iter()
            .map(|t| match t {
                Token::Int(i) => usize::try_from(*i).map_err(|_| self.invalid("negative count")),
                _ => Err(self.invalid(format!("parameter {index} holds a non-integer"))),
            })
            .collect()
    }
}

fn token_real(token: &Token<'_>) -> Option<f64> {
    match token {
        Token::Real(x) => Some(*x),
        #[allow(clippy::cast_precision_loss)]
        Token::Int(i) => Some(*i as f64),
        Token::Typed(_, args) if args.len() == 1 => token_real(&args[0]),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table(statements: &[&'static str]) -> EntityTable<'static> {
        EntityTable::parse(statements).unwrap()
    }

    #[test]
    fn indexes_by_id() {
        let t = table(&["#1=CARTESIAN_POINT('',(0.,0.,0.));", "#5=VERTEX_POINT('',#1);"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(5, 0).unwrap().name(), "VERTEX_POINT");
        assert_eq!(t.ids_of(&["CARTESIAN_POINT", "VERTEX_POINT"]), vec![1, 5]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let r = EntityTable::parse(&["#1=A();", "#1=B();"]);
        assert!(matches!(r, Err(GeometryLoadError::DuplicateEntity(1))));
    }

    #[test]
    fn syntax_error_names_entity() {
        let r = EntityTable::parse(&["#1=A();", "#9=B(,);"]);
        assert!(matches!(r, Err(GeometryLoadError::Syntax { id: 9, .. })));
    }

    #[test]
    fn missing_reference_reported() {
        let t = table(&["#5=VERTEX_POINT('',#1);"]);
        let err = t.get(1, 5).unwrap_err();
        assert!(matches!(err, GeometryLoadError::MissingEntity { id: 1, referenced_by: 5 }));
    }

    #[test]
    fn typed_accessors() {
        let t = table(&["#3=THING('n',2,(1.,2),.T.,#4,$,((#1,#2),(#3,#4)),POSITIVE_LENGTH_MEASURE(2.5));"]);
        let a = Args::of(t.get(3, 0).unwrap(), "THING").unwrap();
        assert_eq!(a.string(0).unwrap(), "n");
        assert_eq!(a.count(1).unwrap(), 2);
        assert_eq!(a.reals(2).unwrap(), vec![1.0, 2.0]);
        assert!(a.boolean(3).unwrap());
        assert_eq!(a.reference(4).unwrap(), 4);
        assert_eq!(a.optional_reference(5).unwrap(), None);
        assert_eq!(a.reference_grid(6).unwrap(), vec![vec![1, 2], vec![3, 4]]);
        assert!((a.real(7).unwrap() - 2.5).abs() < f64::EPSILON);
        assert!(a.real(0).is_err());
        assert!(a.reference(9).is_err());
    }

    #[test]
    fn wrong_type_is_unexpected_entity() {
        let t = table(&["#3=LINE('',#1,#2);"]);
        let err = Args::of(t.get(3, 0).unwrap(), "CIRCLE").unwrap_err();
        assert!(matches!(err, GeometryLoadError::UnexpectedEntity { id: 3, .. }));
    }
}
